//! Property tests for imprint determinism, disclosure soundness and
//! tamper evidence.

use proptest::prelude::*;

use xcert_cert::{expose, imprint, verify, ExposureProof};
use xcert_core::{
    sha256_parts, FieldDescriptor, FieldPath, Record, Schema, SchemaId, Value,
};

fn art_schema() -> Schema {
    Schema::new(
        SchemaId::new(sha256_parts(&[b"art"])),
        vec![
            FieldDescriptor::string("name"),
            FieldDescriptor::bytes("image"),
            FieldDescriptor::integer("edition"),
        ],
    )
    .unwrap()
}

fn art(name: &str, image: Vec<u8>, edition: i64) -> Record {
    Record::new().with("name", name).with("image", image).with("edition", edition)
}

fn paths_from_mask(mask: u8) -> Vec<FieldPath> {
    ["name", "image", "edition"]
        .iter()
        .enumerate()
        .filter(|(i, _)| mask & (1 << i) != 0)
        .map(|(_, n)| FieldPath::from(*n))
        .collect()
}

#[test]
fn unsplash_example() {
    let schema = art_schema();
    let record = art("Unsplash", vec![1, 2, 3, 4, 5], 1);
    let h = imprint(&record, &schema).unwrap();
    assert_eq!(h, imprint(&record.clone(), &schema).unwrap());

    let proof = expose(&record, &schema, &["name".into(), "image".into()]).unwrap();
    assert!(verify(&proof, &h));

    // The undisclosed edition must not appear as plaintext anywhere.
    let json = String::from_utf8(proof.to_wire().unwrap().into_bytes()).unwrap();
    assert!(!json.contains("edition"));
    assert!(proof.value(&"edition".into()).is_none());
    assert_eq!(proof.value(&"name".into()), Some(&Value::from("Unsplash")));
}

#[test]
fn old_proof_fails_against_new_imprint() {
    let schema = art_schema();
    let before = art("Unsplash", vec![1, 2, 3, 4, 5], 1);
    let after = art("Unsplash", vec![1, 2, 3, 4, 5], 2);
    let proof = expose(&before, &schema, &["name".into()]).unwrap();
    let new_imprint = imprint(&after, &schema).unwrap();
    assert!(!verify(&proof, &new_imprint));

    let fresh = expose(&after, &schema, &["name".into()]).unwrap();
    assert_eq!(fresh.disclosed[0].value, proof.disclosed[0].value);
    assert_eq!(fresh.disclosed[0].index, proof.disclosed[0].index);
    assert_ne!(fresh.root, proof.root);
}

proptest! {
    #[test]
    fn imprint_is_deterministic(
        name in ".{0,24}",
        image in prop::collection::vec(any::<u8>(), 0..64),
        edition in any::<i64>(),
    ) {
        let schema = art_schema();
        let a = imprint(&art(&name, image.clone(), edition), &schema).unwrap();
        let b = imprint(&art(&name, image, edition), &schema).unwrap();
        prop_assert_eq!(a, b);
    }

    #[test]
    fn any_disclosure_verifies(
        name in ".{0,24}",
        image in prop::collection::vec(any::<u8>(), 0..64),
        edition in any::<i64>(),
        mask in 0u8..8,
    ) {
        let schema = art_schema();
        let record = art(&name, image, edition);
        let h = imprint(&record, &schema).unwrap();
        let proof = expose(&record, &schema, &paths_from_mask(mask)).unwrap();
        prop_assert_eq!(proof.disclosed.len(), mask.count_ones() as usize);
        prop_assert!(verify(&proof, &h));

        let wire = proof.to_wire().unwrap();
        let back = ExposureProof::from_wire(wire.as_bytes()).unwrap();
        prop_assert!(verify(&back, &h));
    }

    #[test]
    fn undisclosed_tamper_changes_root(
        name in ".{0,24}",
        edition in any::<i64>(),
        delta in 1i64..1000,
    ) {
        let schema = art_schema();
        let original = art(&name, vec![9; 5], edition);
        let tampered = art(&name, vec![9; 5], edition.wrapping_add(delta));
        let proof = expose(&original, &schema, &["name".into(), "image".into()]).unwrap();
        let tampered_imprint = imprint(&tampered, &schema).unwrap();
        prop_assert_ne!(proof.root, tampered_imprint);
        prop_assert!(!verify(&proof, &tampered_imprint));
    }

    #[test]
    fn disclosed_value_tamper_detected(
        name in "[a-z]{1,12}",
        edition in any::<i64>(),
    ) {
        let schema = art_schema();
        let record = art(&name, vec![1, 2, 3], edition);
        let h = imprint(&record, &schema).unwrap();
        let mut proof = expose(&record, &schema, &["edition".into()]).unwrap();
        proof.disclosed[0].value = Value::Integer(edition.wrapping_add(1));
        prop_assert!(!verify(&proof, &h));
    }
}
