//! Property-based tests for key material protection.

use identity_service::crypto::{RsaKeyMaterial, TextEncryptor};
use proptest::prelude::*;
use secrecy::SecretString;

fn encryptor() -> TextEncryptor {
    TextEncryptor::new(&SecretString::from("property-secret"), "5c0744940b5c369b").unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Decrypting an encryption returns the plaintext.
    #[test]
    fn prop_cipher_round_trip(plaintext in ".{0,256}") {
        let encryptor = encryptor();
        let ciphertext = encryptor.encrypt(&plaintext).unwrap();
        prop_assert_ne!(&ciphertext, &plaintext);
        prop_assert_eq!(encryptor.decrypt(&ciphertext).unwrap(), plaintext);
    }

    /// Flipping any ciphertext byte makes decryption fail.
    #[test]
    fn prop_tampering_detected(plaintext in ".{1,64}", index in any::<prop::sample::Index>()) {
        use base64::engine::general_purpose::STANDARD;
        use base64::Engine;

        let encryptor = encryptor();
        let mut raw = STANDARD.decode(encryptor.encrypt(&plaintext).unwrap()).unwrap();
        let i = index.index(raw.len());
        raw[i] ^= 0x01;
        prop_assert!(encryptor.decrypt(&STANDARD.encode(raw)).is_err());
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(3))]

    /// Generated key material survives encryption at rest intact.
    #[test]
    fn prop_key_material_round_trip(_seed in any::<u8>()) {
        let encryptor = encryptor();
        let material = RsaKeyMaterial::generate().unwrap();

        let public = encryptor.decrypt(&encryptor.encrypt(&material.public_pem).unwrap()).unwrap();
        let private = encryptor.decrypt(&encryptor.encrypt(&material.private_pem).unwrap()).unwrap();
        prop_assert_eq!(&public, &material.public_pem);
        prop_assert_eq!(private.as_str(), material.private_pem.as_str());

        let restored = RsaKeyMaterial::from_pems(&material.kid, public, zeroize::Zeroizing::new(private));
        prop_assert!(restored.is_ok());
    }
}
