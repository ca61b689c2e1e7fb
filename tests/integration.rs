//! Integration tests: parse schema text, lint, generate every artifact, and drive the
//! client layout over the resulting wire format.

use confgen::backend::{generate_migration, MigrationModules, WIRE_RUNTIME_TS};
use confgen::codec::{self, CodecError};
use confgen::frame::{self, DeserializeError};
use confgen::lint::{has_errors, lint};
use confgen::{
    dump, generate_client, generate_device, parse, ClientError, ClientLayout, DeviceMode,
    GenerateError, Value,
};

const SIMPLE: &str = r#"
schema simple version 1 {
    name: string(20);
    expert: bool;
}
"#;

const KEYER_V1: &str = r#"
schema keyer_settings version 1 {
    name: string(20) = "keyer";
    keyer {
        wpm: u8 = 20 [5..60];
        mode: enum IambicMode { Straight "Straight key", IambicA default, IambicB };
    }
    display {
        brightness: u8 = 10 [10..];
    }
    calibration_ppm: i32 = -3 [-500..500];
    network {
        home {
            ssid: string(32) = "home";
            password: string(64);
        }
    }
}
"#;

const KEYER_V2: &str = r#"
schema keyer_settings version 2 {
    name: string(20) = "keyer";
    keyer {
        wpm: u8 = 20 [5..60];
        dit_dah_ratio: u16 = 300 [200..450];
        mode: enum IambicMode { Straight "Straight key", IambicA default, IambicB, Ultimatic };
    }
    display {
        brightness: u8 = 10 [10..];
    }
    calibration_ppm: i32 = -3 [-500..500];
    network {
        home {
            ssid: string(32) = "home";
            password: string(64);
        }
    }
}
"#;

#[test]
fn simple_blob_is_byte_exact() {
    let layout = ClientLayout::from_schema(&parse(SIMPLE).unwrap());
    let bytes = layout
        .encode(&[Value::Str("abc".into()), Value::Bool(true)])
        .unwrap();
    assert_eq!(bytes, [0x01, 0x00, 0x00, 0x00, 0x03, 0x61, 0x62, 0x63, 0x01]);
    assert_eq!(
        layout.decode(&bytes).unwrap(),
        [Value::Str("abc".into()), Value::Bool(true)]
    );
}

#[test]
fn wrong_version_wins_over_payload() {
    let layout = ClientLayout::from_schema(&parse(SIMPLE).unwrap());
    let bytes = [0x02, 0x00, 0x00, 0x00, 0xff, 0xff];
    assert!(matches!(
        layout.decode(&bytes),
        Err(ClientError::Deserialize(DeserializeError::WrongVersion { expected: 1, found: 2 }))
    ));
}

#[test]
fn invalid_boolean_byte_is_reported() {
    let layout = ClientLayout::from_schema(&parse(SIMPLE).unwrap());
    let bytes = [0x01, 0x00, 0x00, 0x00, 0x00, 0x02];
    match layout.decode(&bytes) {
        Err(ClientError::Codec(CodecError::InvalidBoolean(2))) => {}
        other => panic!("expected invalid boolean 2, got {:?}", other),
    }
}

#[test]
fn keyer_schema_is_clean() {
    let schema = parse(KEYER_V1).unwrap();
    let messages = lint(&schema);
    assert!(!has_errors(&messages), "{:?}", messages);
}

#[test]
fn keyer_defaults_round_trip() {
    let schema = parse(KEYER_V1).unwrap();
    let layout = ClientLayout::from_schema(&schema);
    let defaults = layout.defaults();
    assert_eq!(defaults[0], Value::Str("keyer".into()));
    assert_eq!(defaults[2], Value::Enum(1));
    assert_eq!(defaults[4], Value::I32(-3));
    let bytes = layout.encode(&defaults).unwrap();
    assert!(bytes.len() <= schema.max_serialized_len());
    assert_eq!(layout.decode(&bytes).unwrap(), defaults);
}

#[test]
fn negative_integer_travels_zigzagged() {
    let layout = ClientLayout::from_schema(&parse(KEYER_V1).unwrap());
    let index = layout.index_of("calibration_ppm").unwrap();
    let msg = layout.encode_update(index, &Value::I32(-3)).unwrap();
    // index 4, then zigzag(-3) = 5
    assert_eq!(msg, [0x04, 0x05]);
}

#[test]
fn update_kind_is_checked_but_not_bounds() {
    let layout = ClientLayout::from_schema(&parse(KEYER_V1).unwrap());
    let wpm = layout.index_of("keyer.wpm").unwrap();
    assert!(matches!(
        layout.encode_update(wpm, &Value::Bool(true)),
        Err(ClientError::TypeMismatch { expected: "u8", got: "bool", .. })
    ));
    // Out of bounds on purpose: the device rejects it, not the client.
    let msg = layout.encode_update(wpm, &Value::U8(200)).unwrap();
    assert_eq!(layout.decode_update(&msg).unwrap(), (wpm, Value::U8(200)));
}

#[test]
fn update_message_layout() {
    let layout = ClientLayout::from_schema(&parse(KEYER_V1).unwrap());
    let ssid = layout.index_of("network.home.ssid").unwrap();
    let msg = layout.encode_update(ssid, &Value::Str("ab".into())).unwrap();
    let mut expected = frame::begin_update(ssid);
    codec::write_str(&mut expected, "ab");
    assert_eq!(msg, expected);
    assert_eq!(msg, [0x05, 0x02, b'a', b'b']);
}

#[test]
fn every_artifact_generates() {
    let v1 = parse(KEYER_V1).unwrap();
    let v2 = parse(KEYER_V2).unwrap();

    let device = generate_device(&v2, DeviceMode::Full).unwrap();
    assert!(device.contains("pub const VERSION: u32 = 2;"));
    assert!(device.contains("pub network__home__ssid: confgen::runtime::BoundedString<32>,"));
    assert!(device.contains("pub struct NetworkHomeView<'c>"));

    let record_only = generate_device(&v1, DeviceMode::Migration).unwrap();
    assert!(!record_only.contains("pub mod keys"));

    let client = generate_client(&v2).unwrap();
    assert!(client.contains("export const VERSION = 2;"));
    assert!(client.contains("  Ultimatic = 3,"));
    assert!(WIRE_RUNTIME_TS.contains("export class Writer"));

    let migration = generate_migration(&v1, &v2, &MigrationModules::new("crate::v1", "crate::v2")).unwrap();
    assert!(migration.contains("    // keyer.dit_dah_ratio: not in version 1"));
    assert!(migration.contains("crate::v2::IambicMode::Ultimatic => to.keyer__mode,"));
}

#[test]
fn new_leaf_shifts_indices_and_old_blobs_are_refused() {
    let old = ClientLayout::from_schema(&parse(KEYER_V1).unwrap());
    let new = ClientLayout::from_schema(&parse(KEYER_V2).unwrap());
    assert_eq!(old.index_of("keyer.mode"), Some(2));
    assert_eq!(new.index_of("keyer.mode"), Some(3));
    assert_eq!(new.index_of("expert"), None);

    let old_blob = old.encode(&old.defaults()).unwrap();
    assert!(matches!(
        new.decode(&old_blob),
        Err(ClientError::Deserialize(DeserializeError::WrongVersion { expected: 2, found: 1 }))
    ));
}

#[test]
fn invalid_schema_yields_no_artifact() {
    let schema = parse("schema bad version 1 { wpm: u8 = 100 [5..60]; }").unwrap();
    for result in [
        generate_device(&schema, DeviceMode::Full),
        generate_client(&schema),
    ] {
        match result {
            Err(GenerateError::Invalid { schema, findings }) => {
                assert_eq!(schema, "bad");
                assert_eq!(findings.len(), 1);
            }
            other => panic!("expected refusal, got {:?}", other.map(|s| s.len())),
        }
    }
}

#[test]
fn unrepresentable_schemas_are_refused_before_generation() {
    let cases = [
        "schema s version 1 { n: string(18446744073709551615); }",
        "schema s version 1 { n: string(4294967296); }",
        r#"schema s version 1 { m: enum Result { A "x\ny" default, B }; }"#,
        "schema s version 1 { m: enum Option { A default }; }",
        "schema s version 1 { m: enum Uint8Array { A default }; }",
    ];
    for text in cases {
        let schema = parse(text).unwrap();
        assert!(has_errors(&lint(&schema)), "{}", text);
        assert!(
            matches!(generate_device(&schema, DeviceMode::Full), Err(GenerateError::Invalid { .. })),
            "{}",
            text
        );
        assert!(matches!(generate_client(&schema), Err(GenerateError::Invalid { .. })), "{}", text);
        // The dump has no lint gate and must not overflow either.
        assert!(dump::render_layout(&schema).contains("1 leaves"));
    }
}

#[test]
fn layout_dump_lists_every_leaf() {
    let text = dump::render_layout(&parse(KEYER_V2).unwrap());
    assert!(text.contains("keyer.dit_dah_ratio"));
    assert!(text.contains("u16 [200..450]"));
    assert!(text.contains("enum IambicMode(4)"));
    assert!(text.lines().last().unwrap().starts_with("8 leaves"));
}
