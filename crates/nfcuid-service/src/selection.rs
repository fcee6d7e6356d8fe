//! Device selection.
//!
//! A configured device number is validated against the readers found in the
//! current session. Number 0 asks the operator; the answer is kept for later
//! sessions.

use crate::error::WatcherError;
use nfcuid_core::DeviceSelection;
use std::io::Write;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader, Lines, Stdin};

/// Interactive source of a device number.
#[allow(async_fn_in_trait)]
pub trait DevicePrompt {
    /// Return a 1-based number in `1..=readers.len()`.
    async fn choose(&mut self, readers: &[String]) -> Result<usize, WatcherError>;
}

/// Parse one line of operator input.
pub fn parse_choice(input: &str, available: usize) -> Result<usize, String> {
    let number: usize = input
        .trim()
        .parse()
        .map_err(|_| "Please input integer value".to_string())?;

    if number < 1 || number > available {
        return Err(format!("Value should be between 1 and {}", available));
    }
    Ok(number)
}

/// Prompt that reads lines from an async reader, stdin by default.
pub struct LinePrompt<R> {
    lines: Lines<BufReader<R>>,
}

pub type StdinPrompt = LinePrompt<Stdin>;

impl StdinPrompt {
    pub fn stdin() -> Self {
        Self::new(tokio::io::stdin())
    }
}

impl<R: AsyncRead + Unpin> LinePrompt<R> {
    pub fn new(reader: R) -> Self {
        Self {
            lines: BufReader::new(reader).lines(),
        }
    }
}

impl<R: AsyncRead + Unpin> DevicePrompt for LinePrompt<R> {
    async fn choose(&mut self, readers: &[String]) -> Result<usize, WatcherError> {
        loop {
            print!("Enter device number to start: ");
            // A failed flush only affects the prompt text.
            let _ = std::io::stdout().flush();

            let line = self
                .lines
                .next_line()
                .await
                .map_err(WatcherError::Prompt)?
                .ok_or(WatcherError::PromptClosed)?;

            match parse_choice(&line, readers.len()) {
                Ok(number) => return Ok(number),
                Err(message) => println!("{}", message),
            }
        }
    }
}

/// Resolve `selection` to a 0-based reader index.
///
/// A prompted number replaces `selection` so the operator is asked once.
pub async fn select_device<P: DevicePrompt>(
    selection: &mut DeviceSelection,
    readers: &[String],
    prompt: &mut P,
) -> Result<usize, WatcherError> {
    if let Some(index) = selection
        .resolve(readers.len())
        .map_err(WatcherError::InvalidDevice)?
    {
        return Ok(index);
    }

    let number = prompt.choose(readers).await?;
    *selection = DeviceSelection::from_number(number);
    selection
        .resolve(readers.len())
        .map_err(WatcherError::InvalidDevice)?
        .ok_or(WatcherError::PromptClosed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn readers(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("Reader {}", i)).collect()
    }

    #[rstest]
    #[case("1", 2, Ok(1))]
    #[case(" 2\r", 2, Ok(2))]
    #[case("0", 2, Err("Value should be between 1 and 2"))]
    #[case("3", 2, Err("Value should be between 1 and 2"))]
    #[case("abc", 2, Err("Please input integer value"))]
    #[case("", 2, Err("Please input integer value"))]
    fn test_parse_choice(
        #[case] input: &str,
        #[case] available: usize,
        #[case] expected: Result<usize, &str>,
    ) {
        assert_eq!(parse_choice(input, available), expected.map_err(str::to_string));
    }

    #[tokio::test]
    async fn test_line_prompt_retries_until_valid() {
        let mut prompt = LinePrompt::new(&b"x\n9\n2\n"[..]);
        assert_eq!(prompt.choose(&readers(3)).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_line_prompt_eof_is_fatal() {
        let mut prompt = LinePrompt::new(&b"7\n"[..]);
        let err = prompt.choose(&readers(2)).await.unwrap_err();
        assert!(matches!(err, WatcherError::PromptClosed));
        assert!(err.is_fatal_configuration());
    }

    #[tokio::test]
    async fn test_select_device_remembers_prompted_number() {
        let mut selection = DeviceSelection::Prompt;
        let mut prompt = LinePrompt::new(&b"2\n"[..]);

        let index = select_device(&mut selection, &readers(2), &mut prompt).await.unwrap();
        assert_eq!(index, 1);
        assert_eq!(selection.number(), 2);

        // The prompt input is exhausted; a second call must not need it.
        let index = select_device(&mut selection, &readers(2), &mut prompt).await.unwrap();
        assert_eq!(index, 1);
    }

    #[tokio::test]
    async fn test_select_device_out_of_range() {
        let mut selection = DeviceSelection::from_number(4);
        let mut prompt = LinePrompt::new(&b""[..]);

        let err = select_device(&mut selection, &readers(2), &mut prompt).await.unwrap_err();
        assert!(matches!(err, WatcherError::InvalidDevice(_)));
        assert_eq!(err.to_string(), "Device number should be between 1 and 2, got: 4");
    }
}
