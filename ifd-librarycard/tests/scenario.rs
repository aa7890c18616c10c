//! End-to-end card sessions driven with raw APDU bytes

use ifd_librarycard::apdu::Response;
use ifd_librarycard::card::CardDataStore;
use ifd_librarycard::config::CardConfig;
use ifd_librarycard::library::{LibraryCardApplet, SigningProfile, LIBRARY_AID};
use ifd_librarycard::VirtualCard;
use rsa::{BigUint, Pkcs1v15Sign, RsaPublicKey};
use sha1::{Digest, Sha1};
use tempfile::TempDir;

fn card_with(store: CardDataStore, signing: SigningProfile) -> VirtualCard {
    let mut card = VirtualCard::new(LibraryCardApplet::new(store, signing));
    card.power_on();
    let mut select = vec![0x00, 0xA4, 0x04, 0x00, LIBRARY_AID.len() as u8];
    select.extend_from_slice(LIBRARY_AID);
    assert_eq!(card.process_apdu(&select), vec![0x90, 0x00]);
    card
}

fn fresh_card() -> VirtualCard {
    card_with(CardDataStore::ephemeral(), SigningProfile::full())
}

fn send(card: &mut VirtualCard, ins: u8, data: &[u8]) -> Response {
    let mut apdu = vec![0x00, ins, 0x00, 0x00];
    if !data.is_empty() {
        apdu.push(data.len() as u8);
        apdu.extend_from_slice(data);
    }
    Response::from_bytes(&card.process_apdu(&apdu)).expect("response carries a status word")
}

fn pin(digits: &[u8]) -> Vec<u8> {
    let mut out = vec![digits.len() as u8];
    out.extend_from_slice(digits);
    out
}

#[test]
fn pin_lifecycle() {
    let mut card = fresh_card();

    assert_eq!(send(&mut card, 0x10, &pin(b"1234")).sw(), 0x9000);
    assert_eq!(send(&mut card, 0x20, &pin(b"0000")).to_bytes(), hex::decode("00029000").unwrap());
    assert_eq!(send(&mut card, 0x20, &pin(b"9999")).to_bytes(), hex::decode("00019000").unwrap());
    assert_eq!(send(&mut card, 0x20, &pin(b"1234")).to_bytes(), hex::decode("019000").unwrap());

    let mut change = pin(b"1234");
    change.extend(pin(b"5678"));
    assert_eq!(send(&mut card, 0x30, &change).sw(), 0x9000);

    assert_eq!(send(&mut card, 0x20, &pin(b"1234")).data[0], 0x00);
    assert_eq!(send(&mut card, 0x20, &pin(b"5678")).data, vec![0x01]);
}

#[test]
fn lockout_and_admin_reset() {
    let mut card = fresh_card();
    send(&mut card, 0x10, &pin(b"1234"));

    for expected in [2u8, 1, 0] {
        assert_eq!(send(&mut card, 0x20, &pin(b"0000")).data, vec![0x00, expected]);
    }
    assert_eq!(send(&mut card, 0x20, &pin(b"1234")).data, vec![0x00, 0x00]);
    assert_eq!(send(&mut card, 0x90, &[]).data, vec![0x00]);

    let mut wrong_key = b"XXXX".to_vec();
    wrong_key.extend(pin(b"2468"));
    assert_eq!(send(&mut card, 0xA0, &wrong_key).sw(), 0x6982);

    let mut reset = b"ADMI".to_vec();
    reset.extend(pin(b"2468"));
    assert_eq!(send(&mut card, 0xA0, &reset).sw(), 0x9000);
    assert_eq!(send(&mut card, 0x90, &[]).data, vec![0x03]);
    assert_eq!(send(&mut card, 0x20, &pin(b"2468")).data, vec![0x01]);
}

#[test]
fn borrowed_books() {
    let mut card = fresh_card();
    send(&mut card, 0x10, &pin(b"1234"));
    assert_eq!(send(&mut card, 0x60, b"BOOK000A").sw(), 0x6982);
    send(&mut card, 0x20, &pin(b"1234"));

    for id in [b"BOOK000A", b"BOOK000B", b"BOOK000C", b"BOOK000D"] {
        assert_eq!(send(&mut card, 0x60, id).sw(), 0x9000);
    }
    assert_eq!(send(&mut card, 0x80, b"BOOK000B").sw(), 0x9000);

    let list = send(&mut card, 0x70, &[]);
    assert_eq!(list.data[0], 3);
    assert_eq!(&list.data[1..], b"BOOK000ABOOK000CBOOK000D");

    assert_eq!(send(&mut card, 0x80, b"BOOK000B").sw(), 0x6A82);
    assert_eq!(send(&mut card, 0x70, &[]), list);

    for n in 0..7u8 {
        let id = [b'X', b'0', b'0', b'0', b'0', b'0', b'0', b'0' + n];
        assert_eq!(send(&mut card, 0x60, &id).sw(), 0x9000);
    }
    assert_eq!(send(&mut card, 0x60, b"BOOK000E").sw(), 0x6A84);
    assert_eq!(send(&mut card, 0x70, &[]).data[0], 10);
}

#[test]
fn card_info_round_trip() {
    let mut card = fresh_card();
    send(&mut card, 0x10, &pin(b"1234"));
    send(&mut card, 0x20, &pin(b"1234"));

    let mut info = b"2026000123".to_vec();
    info.extend(pin(b"Le Van C"));
    info.extend_from_slice(b"30062028");
    assert_eq!(send(&mut card, 0x40, &info).sw(), 0x9000);
    send(&mut card, 0x60, b"BOOK0001");

    let mut expected = info.clone();
    expected.push(1);
    assert_eq!(send(&mut card, 0x50, &[]).data, expected);
}

fn verify_signature(public_key: &[u8], challenge: &[u8], signature: &[u8]) -> bool {
    let key = RsaPublicKey::new(
        BigUint::from_bytes_be(&public_key[..128]),
        BigUint::from_bytes_be(&public_key[128..]),
    )
    .unwrap();
    let hash = Sha1::digest(challenge);
    key.verify(Pkcs1v15Sign::new::<Sha1>(), &hash, signature).is_ok()
}

#[test]
fn challenge_response_with_each_profile() {
    for profile in [SigningProfile::full(), SigningProfile::signature_only(), SigningProfile::raw_only()] {
        let mut card = card_with(CardDataStore::ephemeral(), profile);

        let public_key = send(&mut card, 0xB0, &[]);
        assert_eq!(public_key.sw(), 0x9000);
        assert_eq!(public_key.data.len(), 131);
        assert_eq!(&public_key.data[128..], &[0x01, 0x00, 0x01]);

        for seed in 0..3u8 {
            let challenge = [seed.wrapping_mul(37); 16];
            let first = send(&mut card, 0xB2, &challenge);
            let second = send(&mut card, 0xB2, &challenge);
            assert_eq!(first.data.len(), 128);
            assert!(verify_signature(&public_key.data, &challenge, &first.data));
            assert!(verify_signature(&public_key.data, &challenge, &second.data));
        }

        assert_eq!(send(&mut card, 0xB2, &[0u8; 20]).sw(), 0x6700);
    }
}

#[test]
fn credential_survives_restart() {
    let dir = TempDir::new().unwrap();
    let config = CardConfig::from_lookup(|name| match name {
        "LIBRARYCARD_STORAGE_DIR" => Some(dir.path().display().to_string()),
        _ => None,
    });

    let public_key = {
        let mut card = VirtualCard::from_config(&config);
        card.power_on();
        let mut select = vec![0x00, 0xA4, 0x04, 0x00, 0x07];
        select.extend_from_slice(LIBRARY_AID);
        card.process_apdu(&select);

        send(&mut card, 0x10, &pin(b"1234"));
        send(&mut card, 0x20, &pin(b"0000"));
        send(&mut card, 0xB0, &[]).data
    };

    let mut store = CardDataStore::new(dir.path());
    assert!(store.load());
    let mut card = card_with(store, SigningProfile::full());

    assert_eq!(send(&mut card, 0x90, &[]).data, vec![0x02]);
    assert_eq!(send(&mut card, 0xB1, &[]).data, public_key);
    assert_eq!(send(&mut card, 0xB0, &[]).sw(), 0x6900);

    let challenge = [0xC3u8; 16];
    let signature = send(&mut card, 0xB2, &challenge);
    assert!(verify_signature(&public_key, &challenge, &signature.data));
}
