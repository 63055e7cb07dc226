use super::*;

#[test]
fn display_prefixes_are_stable() {
    assert!(
        RecomposeError::malformed("x")
            .to_string()
            .contains("malformed input:")
    );
    assert!(
        RecomposeError::ambiguous("x")
            .to_string()
            .contains("ambiguous input:")
    );
    assert!(
        RecomposeError::collaborator("x")
            .to_string()
            .contains("collaborator failure:")
    );
    assert!(
        RecomposeError::inconsistent("x")
            .to_string()
            .contains("inconsistent model:")
    );
    assert!(
        RecomposeError::serde("x")
            .to_string()
            .contains("serialization error:")
    );
}

#[test]
fn unresolved_reference_is_malformed() {
    let err = RecomposeError::unresolved_reference("AppIcon/1_person", "AppIcon/Missing");
    assert!(matches!(err, RecomposeError::Malformed(_)));
    assert!(err.to_string().contains("AppIcon/Missing"));
}

#[test]
fn other_preserves_source() {
    let base = std::io::Error::other("boom");
    let err = RecomposeError::Other(anyhow::Error::new(base));
    assert!(err.to_string().contains("boom"));
}
