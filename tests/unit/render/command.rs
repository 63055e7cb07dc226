use super::*;

#[cfg(unix)]
fn script(dir: &Path, name: &str, body: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;
    let path = dir.join(name);
    std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

fn collaborator_message(err: RecomposeError) -> String {
    match err {
        RecomposeError::Collaborator(msg) => msg,
        other => panic!("expected a collaborator failure, got {other}"),
    }
}

// Scripts are written and run from one test so no concurrent fork holds them open.
#[cfg(unix)]
#[test]
fn external_programs() {
    let dir = tempfile::tempdir().unwrap();
    let fixture = dir.path().join("fixture.png");
    image::RgbaImage::from_pixel(8, 8, image::Rgba([10, 20, 30, 255]))
        .save(&fixture)
        .unwrap();
    let source = dir.path().join("Source.app");

    let copies = script(
        dir.path(),
        "copies.sh",
        &format!("cp '{}' \"$2\"", fixture.display()),
    );
    let img = CommandRenderer::new(&copies).render(&source, 16).unwrap();
    assert_eq!(img.dimensions(), (16, 16));
    assert_eq!(img.get_pixel(3, 3).0, [10, 20, 30, 255]);

    let fails = script(dir.path(), "fails.sh", "echo boom >&2\nexit 3");
    let msg = collaborator_message(CommandRenderer::new(&fails).render(&source, 16).unwrap_err());
    assert!(msg.contains("boom"), "{msg}");

    let silent = script(dir.path(), "silent.sh", "exit 0");
    let msg = collaborator_message(CommandRenderer::new(&silent).render(&source, 16).unwrap_err());
    assert!(msg.contains("no image"), "{msg}");

    let garbage = script(dir.path(), "garbage.sh", "echo hello > \"$2\"");
    let msg = collaborator_message(CommandRenderer::new(&garbage).render(&source, 16).unwrap_err());
    assert!(msg.contains("not an image"), "{msg}");

    let missing = dir.path().join("no-such-program");
    let msg = collaborator_message(CommandRenderer::new(&missing).render(&source, 16).unwrap_err());
    assert!(msg.contains("failed to start"), "{msg}");

    let extractor = script(
        dir.path(),
        "extract.sh",
        "touch \"$2/b.svg\" \"$2/a@2x.png\" \"$2/notes.txt\"",
    );
    let out = dir.path().join("extracted");
    let files = CommandExtractor::new(&extractor)
        .extract(Path::new("Assets.car"), &out)
        .unwrap();
    let names: Vec<_> = files.iter().map(|f| f.file_name.as_str()).collect();
    assert_eq!(names, ["a@2x.png", "b.svg"]);

    let broken = script(dir.path(), "broken.sh", "exit 1");
    assert!(CommandExtractor::new(&broken)
        .extract(Path::new("Assets.car"), &out)
        .is_err());
}
