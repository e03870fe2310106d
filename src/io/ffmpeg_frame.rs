// src/io/ffmpeg_frame.rs - single JPEG frame from a video segment
use std::io::ErrorKind;
use std::process::Stdio;

use bytes::Bytes;
use log::debug;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use crate::config::ExtractorConfig;
use crate::core::{CaptureError, CaptureResult};

const JPEG_SOI: [u8; 2] = [0xFF, 0xD8];
const STDERR_TAIL: usize = 512;

#[derive(Debug, Clone)]
pub struct FrameExtractor {
    program: String,
    args: Vec<String>,
}

impl FrameExtractor {
    pub fn new(cfg: &ExtractorConfig) -> Self {
        Self {
            program: cfg.program.clone(),
            args: cfg.args.clone(),
        }
    }

    /// Pipes `video` into the extractor and returns the JPEG it prints.
    ///
    /// Stdin is fed from a separate task while stdout and stderr are drained,
    /// so segments larger than the pipe buffer cannot deadlock. The child is
    /// killed if this future is dropped.
    pub async fn extract_frame(&self, video: Bytes) -> CaptureResult<Vec<u8>> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| CaptureError::extraction(format!("can't start {}: {}", self.program, e)))?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| CaptureError::extraction("can't create stdin pipe"))?;

        let input_len = video.len();
        let writer = tokio::spawn(async move {
            let res = stdin.write_all(&video).await;
            // close so the extractor sees EOF
            drop(stdin);
            res
        });

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| CaptureError::extraction(format!("{} failed: {}", self.program, e)))?;

        match writer.await {
            Ok(Ok(())) => {}
            // extractor exits once it has its frame
            Ok(Err(e)) if e.kind() == ErrorKind::BrokenPipe => {
                debug!("[extract] {} closed stdin early", self.program);
            }
            Ok(Err(e)) => debug!("[extract] writing {} bytes failed: {}", input_len, e),
            Err(e) => debug!("[extract] stdin writer aborted: {}", e),
        }

        if !output.status.success() {
            return Err(CaptureError::extraction(format!(
                "{} exited with {}: {}",
                self.program,
                output.status,
                stderr_tail(&output.stderr)
            )));
        }
        if output.stdout.is_empty() {
            return Err(CaptureError::extraction(format!(
                "{} produced no output",
                self.program
            )));
        }
        if !output.stdout.starts_with(&JPEG_SOI) {
            return Err(CaptureError::extraction(format!(
                "{} output is not a JPEG image",
                self.program
            )));
        }

        Ok(output.stdout)
    }
}

fn stderr_tail(stderr: &[u8]) -> String {
    let text = String::from_utf8_lossy(stderr);
    let text = text.trim();
    let start = text
        .char_indices()
        .rev()
        .nth(STDERR_TAIL)
        .map(|(i, _)| i)
        .unwrap_or(0);
    text[start..].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::mocks::{FAKE_JPEG, failing_extractor, mock_extractor, shell_extractor};

    #[tokio::test]
    async fn returns_extractor_output() {
        let extractor = FrameExtractor::new(&mock_extractor(FAKE_JPEG));

        let jpeg = extractor.extract_frame(Bytes::from_static(&[1u8; 500])).await.unwrap();
        assert_eq!(jpeg, FAKE_JPEG);
    }

    #[tokio::test]
    async fn large_input_does_not_deadlock() {
        let extractor = FrameExtractor::new(&mock_extractor(FAKE_JPEG));
        let video = Bytes::from(vec![0x47u8; 4 * 1024 * 1024]);

        let jpeg = extractor.extract_frame(video).await.unwrap();
        assert_eq!(jpeg, FAKE_JPEG);
    }

    #[tokio::test]
    async fn early_exit_without_reading_stdin_is_fine() {
        let extractor = FrameExtractor::new(&shell_extractor("printf '\\377\\330\\377\\331'"));
        let video = Bytes::from(vec![0u8; 1024 * 1024]);

        let jpeg = extractor.extract_frame(video).await.unwrap();
        assert_eq!(jpeg, [0xFF, 0xD8, 0xFF, 0xD9]);
    }

    #[tokio::test]
    async fn non_zero_exit_is_extraction_error() {
        let extractor = FrameExtractor::new(&failing_extractor());

        let err = extractor.extract_frame(Bytes::from_static(b"corrupt")).await.unwrap_err();
        match err {
            CaptureError::Extraction { reason } => assert!(reason.contains("Invalid data")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn empty_or_non_jpeg_output_is_rejected() {
        let empty = FrameExtractor::new(&shell_extractor("cat > /dev/null"));
        let err = empty.extract_frame(Bytes::from_static(b"x")).await.unwrap_err();
        assert!(err.to_string().contains("no output"));

        let png = FrameExtractor::new(&mock_extractor(b"\x89PNG"));
        let err = png.extract_frame(Bytes::from_static(b"x")).await.unwrap_err();
        assert!(err.to_string().contains("not a JPEG"));
    }

    #[tokio::test]
    async fn missing_program_is_extraction_error() {
        let extractor = FrameExtractor::new(&ExtractorConfig {
            program: "/nonexistent/ffmpeg".to_string(),
            args: Vec::new(),
        });

        let err = extractor.extract_frame(Bytes::new()).await.unwrap_err();
        assert!(matches!(err, CaptureError::Extraction { .. }));
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn child_is_killed_when_extraction_is_dropped() {
        use std::time::Duration;

        let dir = tempfile::tempdir().unwrap();
        let pid_file = dir.path().join("extractor.pid");
        let extractor = FrameExtractor::new(&shell_extractor(&format!(
            "echo $$ > '{}'; exec sleep 30",
            pid_file.display()
        )));

        let res = tokio::time::timeout(
            Duration::from_millis(500),
            extractor.extract_frame(Bytes::from_static(b"x")),
        )
        .await;
        assert!(res.is_err());

        let pid: u32 = std::fs::read_to_string(&pid_file)
            .unwrap()
            .trim()
            .parse()
            .unwrap();
        let mut gone = false;
        for _ in 0..50 {
            if !process_running(pid) {
                gone = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        assert!(gone, "extractor {} still running", pid);
    }

    // an unreaped zombie has already been killed
    #[cfg(target_os = "linux")]
    fn process_running(pid: u32) -> bool {
        match std::fs::read_to_string(format!("/proc/{}/stat", pid)) {
            Ok(stat) => {
                let state = stat
                    .rsplit(')')
                    .next()
                    .and_then(|rest| rest.split_whitespace().next());
                state != Some("Z")
            }
            Err(_) => false,
        }
    }

    #[test]
    fn stderr_tail_keeps_the_end() {
        let long = format!("{}END", "x".repeat(2000));
        let tail = stderr_tail(long.as_bytes());
        assert!(tail.ends_with("END"));
        assert!(tail.len() <= STDERR_TAIL + 1);
    }
}
