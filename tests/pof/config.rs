//! Config Tests
//!
//! `gridwire.toml` driving the POF context.

use crate::common::*;

#[test]
fn test_reference_setting_from_file() {
    let (_dir, path) = config_dir(
        r#"
[pof]
reference_enabled = true
"#,
    );
    let config = GridwireConfig::from_file(&path).unwrap();
    assert!(config.pof.reference_enabled);

    let mut ctx = SimplePofContext::from_config(&config);
    ctx.register_user_type::<OrderLine>(LINE_TYPE).unwrap();

    let line = PofObject::new(OrderLine::default());
    let value = PofValue::Collection(vec![
        PofValue::Object(line.clone()),
        PofValue::Object(line),
    ]);
    let (PofValue::Array(items) | PofValue::Collection(items)) = round_trip(&ctx, &value) else {
        panic!("expected a collection");
    };
    assert!(items[0].as_object().unwrap().ptr_eq(items[1].as_object().unwrap()));
}

#[test]
fn test_default_file_round_trips() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join(gridwire::CONFIG_FILE_NAME);

    GridwireConfig::write_default_if_missing(&path).unwrap();
    let config = GridwireConfig::from_file(&path).unwrap();
    assert_eq!(config, GridwireConfig::default());
    assert!(!config.pof.reference_enabled);

    // an existing file is left alone
    let mut custom = config.clone();
    custom.queue.batch_size = 16;
    custom.write_to_file(&path).unwrap();
    GridwireConfig::write_default_if_missing(&path).unwrap();
    assert_eq!(GridwireConfig::from_file(&path).unwrap().queue.batch_size, 16);
}

#[test]
fn test_invalid_file_is_rejected() {
    let (_dir, path) = config_dir(
        r#"
[queue]
batch_size = 0
"#,
    );
    let err = GridwireConfig::from_file(&path).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Config);

    let (_dir, path) = config_dir("[pof\nreference_enabled = ");
    assert_eq!(
        GridwireConfig::from_file(&path).unwrap_err().kind(),
        ErrorKind::Config
    );
}
