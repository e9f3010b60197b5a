use payment_core::{
    base58, derive_subaddress, extract_tx_public_key, find_payment,
    matcher::{encrypt_amount, PaymentMatcher},
    verify_amount, Address, AddressKind, CurveOps, Ed25519, PublicKey, SecretViewKey,
    SubaddressDeriver, SubaddressIndex, XmrAmount,
};

const BASE_ADDRESS: &str = "44AFFq5kSiGBoZ4NMDwYtN18obc8AemS33DBLWs3H7otXft3XjrpDtQGv7SqSsaBYBb98uNbr2VBBEt7f2wfn3RVGQBEP3A";

fn view_key() -> SecretViewKey {
    SecretViewKey::from_hex("f2c1a7e3b4d5a6978877665544332211ffeeddccbbaa99887766554433221100")
        .unwrap()
}

#[test]
fn subaddress_derivation_is_deterministic() {
    let key = view_key();
    let first = derive_subaddress(BASE_ADDRESS, &key, 1, 2).unwrap();
    let second = derive_subaddress(BASE_ADDRESS, &key, 1, 2).unwrap();
    assert_eq!(first, second);

    let raw = base58::decode(&first).unwrap();
    assert_eq!(raw.len(), 69);
    assert_eq!(raw[0], 0x2A);
    assert_ne!(first, BASE_ADDRESS);
}

#[test]
fn primary_index_returns_base_address() {
    assert_eq!(
        derive_subaddress(BASE_ADDRESS, &view_key(), 0, 0).unwrap(),
        BASE_ADDRESS
    );
}

#[test]
fn distinct_indices_give_distinct_subaddresses() {
    let key = view_key();
    let mut seen = std::collections::HashSet::new();
    for major in 0..3u64 {
        for minor in 0..4u64 {
            let addr = derive_subaddress(BASE_ADDRESS, &key, major, minor).unwrap();
            assert!(seen.insert(addr), "collision at {major}/{minor}");
        }
    }
}

/// Full sender/receiver exchange against a derived subaddress: the sender
/// publishes `R = r·D` and builds the output from `8r·C`; the merchant sees it
/// with only the private view key.
#[test]
fn payment_to_subaddress_is_detected_and_verified() {
    let curve = Ed25519;
    let key = view_key();
    let base = Address::parse(BASE_ADDRESS).unwrap();
    let sub = SubaddressDeriver::new(curve)
        .derive_keys(&base, &key, SubaddressIndex::new(1, 5))
        .unwrap();
    assert_eq!(
        Address::parse(&sub.address).unwrap().kind,
        AddressKind::Subaddress
    );

    let mut tx_secret = [0u8; 32];
    tx_secret[..4].copy_from_slice(&[0x13, 0x37, 0xbe, 0xef]);
    let tx_public_key = PublicKey(
        curve
            .scalar_mult(&tx_secret, sub.spend_public.as_bytes())
            .unwrap(),
    );

    let mut r8 = tx_secret;
    for _ in 0..3 {
        r8 = curve.scalar_add(&r8, &r8).unwrap();
    }
    let sender_derivation = curve.scalar_mult(&r8, sub.view_public.as_bytes()).unwrap();

    let matcher = PaymentMatcher::new(curve);
    let receiver_derivation = matcher.key_derivation(&key, &tx_public_key).unwrap();
    assert_eq!(receiver_derivation.as_bytes(), &sender_derivation);

    let output_key = matcher
        .expected_output_key(&receiver_derivation, &sub.spend_public, 1)
        .unwrap();
    let change_key = PublicKey(curve.scalar_mult_base(&[9u8; 32]).unwrap());
    let scalar = matcher.derivation_scalar(&receiver_derivation, 1).unwrap();
    let price = XmrAmount::parse("0.0734").unwrap();
    let encrypted = encrypt_amount(&scalar, price);

    let mut extra = vec![0x01];
    extra.extend_from_slice(tx_public_key.as_bytes());
    let parsed_key = extract_tx_public_key(&extra).unwrap();

    let outputs = [change_key, output_key];
    let found = find_payment(&key, &sub.spend_public, &parsed_key, &outputs).unwrap();
    assert!(found.matched);
    assert_eq!(found.index, 1);
    assert!(verify_amount(&key, &parsed_key, &encrypted, found.index, price).unwrap());
    assert!(!verify_amount(
        &key,
        &parsed_key,
        &encrypted,
        found.index,
        XmrAmount::parse("0.0735").unwrap()
    )
    .unwrap());

    // The base address's own spend key does not claim the subaddress output.
    let other = find_payment(&key, &base.spend_public, &parsed_key, &outputs).unwrap();
    assert!(!other.matched);
}

#[test]
fn find_payment_on_empty_outputs_is_unmatched() {
    let tx_key = PublicKey(Ed25519.scalar_mult_base(&[5u8; 32]).unwrap());
    let base = Address::parse(BASE_ADDRESS).unwrap();
    let result = find_payment(&view_key(), &base.spend_public, &tx_key, &[]).unwrap();
    assert!(!result.matched);
}
