use std::process::Command;

use include_exe::{Digests, EmbeddedArtifact, include_exe};

static HELLO: EmbeddedArtifact = include_exe!("blobs/hello.sh");

fn main() {
    let original_content = include_bytes!("../../blobs/hello.sh");

    let data = HELLO.bytes().expect("embedded executable decodes");
    assert_eq!(data.len(), HELLO.decoded_len());
    assert_eq!(data.as_slice(), original_content.as_slice());
    assert_eq!(Digests::of(&data), HELLO.digests());
    println!("Decoded {} ({} bytes).", HELLO.name(), data.len());

    let dir = std::env::temp_dir().join(format!(
        "include_exe_test_project_{}",
        std::process::id()
    ));
    std::fs::create_dir_all(&dir).expect("create scratch directory");
    let path = dir.join(HELLO.name());

    HELLO.write_file(&path).expect("materialize executable");
    HELLO.verify_file(&path).expect("materialized executable matches digests");
    assert!(matches!(
        HELLO.write_file(&path),
        Err(include_exe::Error::DestinationExists(_))
    ));
    println!("Materialized executable matches original.");

    if cfg!(unix) {
        let output = Command::new(&path).output().expect("run materialized executable");
        let stdout = String::from_utf8_lossy(&output.stdout);
        assert!(output.status.success(), "helper failed: {output:?}");
        assert!(stdout.contains(HELLO.version()), "unexpected helper output: {stdout}");
        print!("{stdout}");
    }

    std::fs::remove_dir_all(&dir).expect("remove scratch directory");
}
