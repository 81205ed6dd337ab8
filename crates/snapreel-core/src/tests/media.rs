use crate::{
    h264_encoder, locate_ffmpeg,
    media::ffmpeg::{is_disk_full, stderr_tail},
};

use tempfile::TempDir;

/// WHAT: A configured ffmpeg path that exists is used as-is
/// WHY: Users with custom builds must be able to pin the binary
#[test]
fn given_existing_configured_path_when_locating_then_configured_path_returned() {
    // Given: A file standing in for ffmpeg
    let temp = TempDir::new().unwrap();
    let fake = temp.path().join("ffmpeg");
    std::fs::write(&fake, b"").unwrap();

    // When: Locating with that path configured
    let found = locate_ffmpeg(Some(&fake));

    // Then: It wins
    assert_eq!(found, Some(fake));
}

/// WHAT: A configured path that does not exist falls back to searching
/// WHY: A stale config must not break recording when ffmpeg is installed elsewhere
#[test]
fn given_missing_configured_path_when_locating_then_not_returned() {
    // Given: A path that does not exist
    let temp = TempDir::new().unwrap();
    let missing = temp.path().join("missing-ffmpeg");

    // When: Locating
    let found = locate_ffmpeg(Some(&missing));

    // Then: Whatever is found, it is not the missing path
    assert_ne!(found, Some(missing));
}

/// WHAT: Only the last lines of ffmpeg stderr are kept
/// WHY: Error messages stay readable while keeping the actual failure
#[test]
fn given_long_stderr_when_taking_tail_then_last_lines_kept() {
    // Given: Twenty lines of stderr with blanks
    let stderr: String = (0..20).map(|i| format!("line {}\n\n", i)).collect();

    // When: Taking the tail
    let tail = stderr_tail(stderr.as_bytes());

    // Then: Last eight non-empty lines
    let lines: Vec<&str> = tail.lines().collect();
    assert_eq!(lines.len(), 8);
    assert_eq!(lines[0], "line 12");
    assert_eq!(lines[7], "line 19");
}

/// WHAT: ENOSPC in ffmpeg output is recognised as disk full
/// WHY: Disk full is reported separately from other export failures
#[test]
fn given_enospc_message_when_checking_then_disk_full() {
    // Given/When/Then
    assert!(is_disk_full("out.mp4: No space left on device"));
    assert!(!is_disk_full("Invalid data found when processing input"));
}

/// WHAT: The H.264 encoder is hardware on macOS and x264 elsewhere
/// WHY: Real-time 4K encoding needs VideoToolbox on Macs
#[test]
fn given_platform_when_choosing_encoder_then_expected_encoder() {
    // Given/When
    let encoder = h264_encoder();

    // Then
    if cfg!(target_os = "macos") {
        assert_eq!(encoder, "h264_videotoolbox");
    } else {
        assert_eq!(encoder, "libx264");
    }
}
