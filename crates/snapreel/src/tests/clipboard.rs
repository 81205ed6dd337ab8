use crate::ArboardClipboard;

use snapreel_core::ClipboardService;

use tempfile::TempDir;

/// WHAT: A saved file can be published to the clipboard
/// WHY: Copy-to-clipboard pastes the recording as a file into other apps
#[test]
#[ignore] // Requires a desktop session with clipboard access - run manually with: cargo test -- --ignored
fn given_file_when_publishing_then_clipboard_accepts_it() {
    // Given: A clipboard and a real file
    let clipboard = ArboardClipboard::new().unwrap();
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("Recording.mp4");
    std::fs::write(&path, b"mp4").unwrap();

    // When: Publishing it
    let result = clipboard.publish_file(&path);

    // Then: Accepted
    assert!(result.is_ok());
}
