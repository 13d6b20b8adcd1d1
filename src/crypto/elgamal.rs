// Permission is hereby granted, free of charge, to any person obtaining a
// copy of this software and associated documentation files (the "Software"),
// to deal in the Software without restriction, including without limitation
// the rights to use, copy, modify, merge, publish, distribute, sublicense,
// and/or sell copies of the Software, and to permit persons to whom the
// Software is furnished to do so, subject to the following conditions:
//
// The above copyright notice and this permission notice shall be included in
// all copies or substantial portions of the Software.
//
// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS
// OR IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
// FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
// AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
// LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING
// FROM, OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER
// DEALINGS IN THE SOFTWARE.

//! ElGamal public-key encryption over the 2048-bit MODP DH group.
//!
//! https://geti2p.net/spec/cryptography#elgamal
//!
//! Plaintexts are wrapped in the I2P ElGamal block: a non-zero byte,
//! the SHA-256 digest of the data and up to 222 bytes of data. The
//! ciphertext is the unpadded encoding used by tunnel build records:
//! two 256-byte big-endian group elements.

use crate::crypto::sha256::Sha256;

use lazy_static::lazy_static;
use num_bigint::BigUint;
use num_traits::{One, Zero};
use rand_core::{CryptoRng, RngCore};
use zeroize::Zeroize;

use alloc::vec::Vec;
use core::ops::Sub;

/// Serialized group element length.
pub const ELGAMAL_KEY_LEN: usize = 256;

/// Ciphertext length, two unpadded group elements.
pub const ELGAMAL_CIPHERTEXT_LEN: usize = 512;

/// Maximum plaintext length fitting into one encryption block.
pub const ELGAMAL_PLAINTEXT_LEN: usize = 222;

/// Encryption block length: non-zero byte, SHA-256 digest, data.
const ELGAMAL_BLOCK_LEN: usize = 255;

/// This modulus is the prime from the 2048-bit MODP DH group:
/// https://tools.ietf.org/html/rfc3526#section-3
const RFC3526_2048BIT_MODP_GROUP: &str =
    "FFFFFFFF_FFFFFFFF_C90FDAA2_2168C234_C4C6628B_80DC1CD1\
     29024E08_8A67CC74_020BBEA6_3B139B22_514A0879_8E3404DD\
     EF9519B3_CD3A431B_302B0A6D_F25F1437_4FE1356D_6D51C245\
     E485B576_625E7EC6_F44C42E9_A637ED6B_0BFF5CB6_F406B7ED\
     EE386BFB_5A899FA5_AE9F2411_7C4B1FE6_49286651_ECE45B3D\
     C2007CB8_A163BF05_98DA4836_1C55D39A_69163FA8_FD24CF5F\
     83655D23_DCA3AD96_1C62F356_208552BB_9ED52907_7096966D\
     670C354E_4ABC9804_F1746C08_CA18217C_32905E46_2E36CE3B\
     E39E772C_180E8603_9B2783A2_EC07A28F_B5C55DF0_6F4C52C9\
     DE2BCBF6_95581718_3995497C_EA956AE5_15D22618_98FA0510\
     15728E5A_8AACAA68_FFFFFFFF_FFFFFFFF";

lazy_static! {
    static ref ELGAMAL_G: BigUint = BigUint::from(2u32);
    static ref ELGAMAL_P: BigUint = {
        let digits = RFC3526_2048BIT_MODP_GROUP.replace('_', "");

        BigUint::parse_bytes(digits.as_bytes(), 16).expect("valid modulus")
    };
    static ref ELGAMAL_PM1: BigUint = (&(*ELGAMAL_P)).sub(BigUint::one());
    static ref ELGAMAL_PM2: BigUint = (&(*ELGAMAL_PM1)).sub(BigUint::one());
}

/// Converts the given number into an array of exactly `len` bytes,
/// padding with leading zeroes if necessary.
fn rectify(value: &BigUint, len: usize) -> Vec<u8> {
    let bytes = value.to_bytes_be();
    assert!(bytes.len() <= len, "group element too large");

    let mut out = alloc::vec![0u8; len];
    out[len - bytes.len()..].copy_from_slice(&bytes);

    out
}

/// Select a random integer k, 1 <= k <= p - 2.
fn random_exponent(rng: &mut (impl RngCore + CryptoRng)) -> BigUint {
    loop {
        let mut bytes = [0u8; ELGAMAL_KEY_LEN];
        rng.fill_bytes(&mut bytes);

        let k = BigUint::from_bytes_be(&bytes);
        if !k.is_zero() && k <= *ELGAMAL_PM2 {
            break k;
        }
    }
}

/// The public component of an ElGamal encryption keypair.
#[derive(Clone)]
pub struct PublicKey([u8; ELGAMAL_KEY_LEN]);

impl PublicKey {
    /// Create [`PublicKey`] from a serialized group element.
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        let key: [u8; ELGAMAL_KEY_LEN] = bytes.try_into().ok()?;

        Some(PublicKey(key))
    }

    /// Encrypt `plaintext` (at most 222 bytes, zero-padded to full
    /// length) and return the 512-byte unpadded ciphertext.
    pub fn encrypt(
        &self,
        plaintext: &[u8],
        rng: &mut (impl RngCore + CryptoRng),
    ) -> [u8; ELGAMAL_CIPHERTEXT_LEN] {
        assert!(plaintext.len() <= ELGAMAL_PLAINTEXT_LEN, "plaintext too large");

        let mut data = [0u8; ELGAMAL_PLAINTEXT_LEN];
        data[..plaintext.len()].copy_from_slice(plaintext);

        let mut block = [0u8; ELGAMAL_BLOCK_LEN];
        block[0] = loop {
            let mut nonzero = [0u8; 1];
            rng.fill_bytes(&mut nonzero);

            if nonzero[0] != 0 {
                break nonzero[0];
            }
        };
        block[1..33].copy_from_slice(&Sha256::new().update(data).finalize());
        block[33..].copy_from_slice(&data);

        let m = BigUint::from_bytes_be(&block);
        let y = BigUint::from_bytes_be(&self.0);
        let k = random_exponent(rng);

        // a = g^k mod p, b = y^k * m mod p
        let a = ELGAMAL_G.modpow(&k, &ELGAMAL_P);
        let b = (y.modpow(&k, &ELGAMAL_P) * m) % &*ELGAMAL_P;

        let mut out = [0u8; ELGAMAL_CIPHERTEXT_LEN];
        out[..ELGAMAL_KEY_LEN].copy_from_slice(&rectify(&a, ELGAMAL_KEY_LEN));
        out[ELGAMAL_KEY_LEN..].copy_from_slice(&rectify(&b, ELGAMAL_KEY_LEN));

        out
    }
}

impl AsRef<[u8]> for PublicKey {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// The private component of an ElGamal encryption keypair.
#[derive(Clone)]
pub struct PrivateKey([u8; ELGAMAL_KEY_LEN]);

impl PrivateKey {
    /// Create [`PrivateKey`] from a serialized exponent.
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        let key: [u8; ELGAMAL_KEY_LEN] = bytes.try_into().ok()?;

        Some(PrivateKey(key))
    }

    /// Decrypt `ciphertext` and return the recovered 222 data bytes.
    ///
    /// Returns `None` if the ciphertext has the wrong length or the
    /// digest embedded in the decrypted block doesn't match the data.
    pub fn decrypt(&self, ciphertext: &[u8]) -> Option<[u8; ELGAMAL_PLAINTEXT_LEN]> {
        if ciphertext.len() != ELGAMAL_CIPHERTEXT_LEN {
            return None;
        }

        let a = BigUint::from_bytes_be(&ciphertext[..ELGAMAL_KEY_LEN]);
        let b = BigUint::from_bytes_be(&ciphertext[ELGAMAL_KEY_LEN..]);
        let x = BigUint::from_bytes_be(&self.0);

        // m = b * a^(p - 1 - x) mod p
        let exponent = (&(*ELGAMAL_PM1)).sub(&x);
        let m = (b * a.modpow(&exponent, &ELGAMAL_P)) % &*ELGAMAL_P;

        let bytes = m.to_bytes_be();
        if bytes.len() > ELGAMAL_BLOCK_LEN {
            return None;
        }

        let mut block = [0u8; ELGAMAL_BLOCK_LEN];
        block[ELGAMAL_BLOCK_LEN - bytes.len()..].copy_from_slice(&bytes);

        let digest = Sha256::new().update(&block[33..]).finalize();
        if digest != block[1..33] {
            return None;
        }

        let mut data = [0u8; ELGAMAL_PLAINTEXT_LEN];
        data.copy_from_slice(&block[33..]);

        Some(data)
    }
}

impl Drop for PrivateKey {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

/// Generates ElGamal keypairs.
pub struct KeyPairGenerator;

impl KeyPairGenerator {
    /// ElGamal key generation.
    ///
    /// Select a random integer x, 1 <= x <= p - 2; the public key
    /// is g^x mod p.
    pub fn generate(rng: &mut (impl RngCore + CryptoRng)) -> (PrivateKey, PublicKey) {
        let x = random_exponent(rng);
        let y = ELGAMAL_G.modpow(&x, &ELGAMAL_P);

        let private_key = {
            let mut key = [0u8; ELGAMAL_KEY_LEN];
            key.copy_from_slice(&rectify(&x, ELGAMAL_KEY_LEN));
            PrivateKey(key)
        };

        let public_key = {
            let mut key = [0u8; ELGAMAL_KEY_LEN];
            key.copy_from_slice(&rectify(&y, ELGAMAL_KEY_LEN));
            PublicKey(key)
        };

        (private_key, public_key)
    }
}
