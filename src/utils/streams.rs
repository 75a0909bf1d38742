// src/utils/streams.rs
use anyhow::{anyhow, Result};
use log::debug;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Child;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ChildStream {
    Stdout,
    Stderr,
}

/// Drains one output stream of a spawned child into lines.
///
/// # Arguments
///
/// * `child` - Spawned process with the stream piped.
/// * `stream` - Which stream to read.
///
/// # Returns
/// Vec of lines in output order.
pub async fn read_child_output_to_vec(child: &mut Child, stream: ChildStream) -> Result<Vec<String>> {
    let mut lines_out = Vec::new();
    match stream {
        ChildStream::Stdout => {
            let stdout = child.stdout.take().ok_or_else(|| anyhow!("Child stdout not piped"))?;
            let mut lines = BufReader::new(stdout).lines();
            while let Some(line) = lines.next_line().await? {
                lines_out.push(line);
            }
        }
        ChildStream::Stderr => {
            let stderr = child.stderr.take().ok_or_else(|| anyhow!("Child stderr not piped"))?;
            let mut lines = BufReader::new(stderr).lines();
            while let Some(line) = lines.next_line().await? {
                lines_out.push(line);
            }
        }
    }
    debug!("Read {} lines from child {:?}", lines_out.len(), stream);
    Ok(lines_out)
}


#[cfg(test)]
mod tests {
    use super::*;
    use std::process::Stdio;
    use tokio::process::Command;

    #[tokio::test]
    async fn test_read_stdout_lines() -> Result<()> {
        let mut child = Command::new("printf")
            .arg("a\\nb\\n")
            .stdout(Stdio::piped())
            .spawn()?;
        let lines = read_child_output_to_vec(&mut child, ChildStream::Stdout).await?;
        child.wait().await?;
        assert_eq!(lines, vec!["a", "b"]);
        Ok(())
    }

    #[tokio::test]
    async fn test_unpiped_stream_is_error() -> Result<()> {
        let mut child = Command::new("true").stdout(Stdio::null()).spawn()?;
        assert!(read_child_output_to_vec(&mut child, ChildStream::Stderr).await.is_err());
        child.wait().await?;
        Ok(())
    }
}
