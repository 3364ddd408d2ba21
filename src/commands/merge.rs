//! Merge command implementation

use eternity_flash::merge_files;
use std::path::Path;

/// Run the merge command
pub fn run_merge(
    first: &Path,
    second: &Path,
    offset: u32,
    output: &Path,
    fill: u8,
) -> Result<(), Box<dyn std::error::Error>> {
    let size = merge_files(first, second, offset as usize, output, fill)?;
    println!(
        "Joined {} and {} into {} (size: {} bytes)",
        file_name(first),
        file_name(second),
        file_name(output),
        size
    );
    Ok(())
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_merge() {
        let dir = tempfile::tempdir().unwrap();
        let boot = dir.path().join("boot.bin");
        let app = dir.path().join("app.bin");
        let out = dir.path().join("out.bin");
        std::fs::write(&boot, [1u8; 10]).unwrap();
        std::fs::write(&app, [2u8; 20]).unwrap();

        run_merge(&boot, &app, 16, &out, 0xFF).unwrap();
        assert_eq!(std::fs::read(&out).unwrap().len(), 36);

        assert!(run_merge(&boot, &app, 5, &out, 0xFF).is_err());
    }

    #[test]
    fn test_file_name() {
        assert_eq!(file_name(Path::new("/tmp/x/app.bin")), "app.bin");
    }
}
