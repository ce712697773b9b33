// The DES tables and key schedule follow UnixCrypt.
// SPDX-FileCopyrightText: Copyright 1996 Aki Yoshida
// SPDX-FileCopyrightText: Copyright 2001 Iris Van den Broeke
// SPDX-FileCopyrightText: Copyright 2001 Daniel Deville
// SPDX-FileCopyrightText: Copyright 2004 Greg Wilkins
// SPDX-FileCopyrightText: Copyright 2015 Hajime Nakagami
// SPDX-FileCopyrightText: Copyright 2015-2024 Mark Rotteveel
// SPDX-License-Identifier: UnixCrypt

//! Legacy_Auth: the pre-3.0 password hash
//!
//! A DES-based crypt(3) variant with a fixed salt and 25 iterations. The
//! 8-byte key is built from the first 8 password characters, each doubled.
//! The 64-bit result block becomes 11 characters of the `./0-9A-Za-z`
//! alphabet.

use super::plugin::{AuthCredentials, AuthStatus, AuthenticationPlugin, AuthenticationPluginSpi};
use crate::{Error, Result};
use std::sync::OnceLock;

/// Plugin name on the wire
pub const LEGACY_AUTH_NAME: &str = "Legacy_Auth";

const ROTATES: [u8; 16] = [1, 1, 2, 2, 2, 2, 2, 2, 1, 2, 2, 2, 2, 2, 2, 1];

const ITOA64: &[u8; 64] = b"./0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz";

const FB_SALT: i64 = 754_712_576;

const ITERATIONS: usize = 25;

const KEY_SCHEDULE_MASK: i64 = !0x0303_0303_0000_0000;

const PC1: [u8; 56] = [
    57, 49, 41, 33, 25, 17, 9, 1, 58, 50, 42, 34, 26, 18, 10, 2, 59, 51, 43, 35, 27, 19, 11, 3,
    60, 52, 44, 36, 63, 55, 47, 39, 31, 23, 15, 7, 62, 54, 46, 38, 30, 22, 14, 6, 61, 53, 45, 37,
    29, 21, 13, 5, 28, 20, 12, 4,
];

const PC2: [u8; 64] = [
    9, 18, 14, 17, 11, 24, 1, 5, 22, 25, 3, 28, 15, 6, 21, 10, 35, 38, 23, 19, 12, 4, 26, 8, 43,
    54, 16, 7, 27, 20, 13, 2, 0, 0, 41, 52, 31, 37, 47, 55, 0, 0, 30, 40, 51, 45, 33, 48, 0, 0, 44,
    49, 39, 56, 34, 53, 0, 0, 46, 42, 50, 36, 29, 32,
];

const IP: [u8; 64] = [
    58, 50, 42, 34, 26, 18, 10, 2, 60, 52, 44, 36, 28, 20, 12, 4, 62, 54, 46, 38, 30, 22, 14, 6,
    64, 56, 48, 40, 32, 24, 16, 8, 57, 49, 41, 33, 25, 17, 9, 1, 59, 51, 43, 35, 27, 19, 11, 3,
    61, 53, 45, 37, 29, 21, 13, 5, 63, 55, 47, 39, 31, 23, 15, 7,
];

const EXPAND_TR: [u8; 48] = [
    32, 1, 2, 3, 4, 5, 4, 5, 6, 7, 8, 9, 8, 9, 10, 11, 12, 13, 12, 13, 14, 15, 16, 17, 16, 17, 18,
    19, 20, 21, 20, 21, 22, 23, 24, 25, 24, 25, 26, 27, 28, 29, 28, 29, 30, 31, 32, 1,
];

const CIFP: [u8; 64] = [
    1, 2, 3, 4, 17, 18, 19, 20, 5, 6, 7, 8, 21, 22, 23, 24, 9, 10, 11, 12, 25, 26, 27, 28, 13, 14,
    15, 16, 29, 30, 31, 32, 33, 34, 35, 36, 49, 50, 51, 52, 37, 38, 39, 40, 53, 54, 55, 56, 41, 42,
    43, 44, 57, 58, 59, 60, 45, 46, 47, 48, 61, 62, 63, 64,
];

const S: [[u8; 64]; 8] = [
    [
        14, 4, 13, 1, 2, 15, 11, 8, 3, 10, 6, 12, 5, 9, 0, 7, 0, 15, 7, 4, 14, 2, 13, 1, 10, 6, 12,
        11, 9, 5, 3, 8, 4, 1, 14, 8, 13, 6, 2, 11, 15, 12, 9, 7, 3, 10, 5, 0, 15, 12, 8, 2, 4, 9, 1,
        7, 5, 11, 3, 14, 10, 0, 6, 13,
    ],
    [
        15, 1, 8, 14, 6, 11, 3, 4, 9, 7, 2, 13, 12, 0, 5, 10, 3, 13, 4, 7, 15, 2, 8, 14, 12, 0, 1,
        10, 6, 9, 11, 5, 0, 14, 7, 11, 10, 4, 13, 1, 5, 8, 12, 6, 9, 3, 2, 15, 13, 8, 10, 1, 3, 15,
        4, 2, 11, 6, 7, 12, 0, 5, 14, 9,
    ],
    [
        10, 0, 9, 14, 6, 3, 15, 5, 1, 13, 12, 7, 11, 4, 2, 8, 13, 7, 0, 9, 3, 4, 6, 10, 2, 8, 5, 14,
        12, 11, 15, 1, 13, 6, 4, 9, 8, 15, 3, 0, 11, 1, 2, 12, 5, 10, 14, 7, 1, 10, 13, 0, 6, 9, 8,
        7, 4, 15, 14, 3, 11, 5, 2, 12,
    ],
    [
        7, 13, 14, 3, 0, 6, 9, 10, 1, 2, 8, 5, 11, 12, 4, 15, 13, 8, 11, 5, 6, 15, 0, 3, 4, 7, 2, 12,
        1, 10, 14, 9, 10, 6, 9, 0, 12, 11, 7, 13, 15, 1, 3, 14, 5, 2, 8, 4, 3, 15, 0, 6, 10, 1, 13,
        8, 9, 4, 5, 11, 12, 7, 2, 14,
    ],
    [
        2, 12, 4, 1, 7, 10, 11, 6, 8, 5, 3, 15, 13, 0, 14, 9, 14, 11, 2, 12, 4, 7, 13, 1, 5, 0, 15,
        10, 3, 9, 8, 6, 4, 2, 1, 11, 10, 13, 7, 8, 15, 9, 12, 5, 6, 3, 0, 14, 11, 8, 12, 7, 1, 14, 2,
        13, 6, 15, 0, 9, 10, 4, 5, 3,
    ],
    [
        12, 1, 10, 15, 9, 2, 6, 8, 0, 13, 3, 4, 14, 7, 5, 11, 10, 15, 4, 2, 7, 12, 9, 5, 6, 1, 13,
        14, 0, 11, 3, 8, 9, 14, 15, 5, 2, 8, 12, 3, 7, 0, 4, 10, 1, 13, 11, 6, 4, 3, 2, 12, 9, 5, 15,
        10, 11, 14, 1, 7, 6, 0, 8, 13,
    ],
    [
        4, 11, 2, 14, 15, 0, 8, 13, 3, 12, 9, 7, 5, 10, 6, 1, 13, 0, 11, 7, 4, 9, 1, 10, 14, 3, 5,
        12, 2, 15, 8, 6, 1, 4, 11, 13, 12, 3, 7, 14, 10, 15, 6, 8, 0, 5, 9, 2, 6, 11, 13, 8, 1, 4,
        10, 7, 9, 5, 0, 15, 14, 2, 3, 12,
    ],
    [
        13, 2, 8, 4, 6, 15, 11, 1, 10, 9, 3, 14, 5, 0, 12, 7, 1, 15, 13, 8, 10, 3, 7, 4, 12, 5, 6,
        11, 0, 14, 9, 2, 7, 11, 4, 1, 9, 12, 14, 2, 0, 6, 10, 13, 15, 3, 5, 8, 2, 1, 14, 7, 4, 10, 8,
        13, 15, 12, 9, 0, 3, 5, 6, 11,
    ],
];

const P32_TR: [u8; 32] = [
    16, 7, 20, 21, 29, 12, 28, 17, 1, 15, 23, 26, 5, 18, 31, 10, 2, 8, 24, 14, 32, 27, 3, 9, 19,
    13, 30, 6, 22, 11, 4, 25,
];

type PermTable = [[i64; 16]; 16];

/// Permutation tables derived once from the DES constants
struct DesTables {
    pc1_rot: PermTable,
    pc2_rot: [PermTable; 2],
    spe: [[i64; 64]; 8],
    cf6464: PermTable,
}

/// Reverse the bit order within a byte for a 1-based bit position
fn flip_bit_position(k: i32) -> i32 {
    let k = k - 1;
    ((k | 0x07) - (k & 0x07)) + 1
}

fn init_perm(perm: &mut PermTable, p: &[u8; 64]) {
    for (k, &pk) in p.iter().enumerate() {
        let l = i32::from(pk) - 1;
        if l < 0 {
            continue;
        }
        let i = (l >> 2) as usize;
        let bit = 1usize << (l & 0x03);
        let s = (k & 0x07) + ((7 - (k >> 3)) << 3);
        for (j, slot) in perm[i].iter_mut().enumerate() {
            if j & bit != 0 {
                *slot |= 1i64 << s;
            }
        }
    }
}

impl DesTables {
    fn build() -> Self {
        let mut tables = DesTables {
            pc1_rot: [[0; 16]; 16],
            pc2_rot: [[[0; 16]; 16]; 2],
            spe: [[0; 64]; 8],
            cf6464: [[0; 16]; 16],
        };
        let mut perm = [0u8; 64];
        let mut temp = [0u8; 64];

        for (i, &pc2) in PC2.iter().enumerate() {
            let mut k = i32::from(pc2);
            if k == 0 {
                continue;
            }
            if k % 28 < 1 {
                k -= 28;
            }
            perm[i] = flip_bit_position(i32::from(PC1[k as usize])) as u8;
        }
        init_perm(&mut tables.pc1_rot, &perm);

        for j in 0..2i32 {
            perm = [0; 64];
            temp = [0; 64];
            for (i, &pc2) in PC2.iter().enumerate() {
                if pc2 != 0 {
                    temp[usize::from(pc2) - 1] = (i + 1) as u8;
                }
            }
            for (i, &pc2) in PC2.iter().enumerate() {
                let mut k = i32::from(pc2);
                if k == 0 {
                    continue;
                }
                k += j;
                if k % 28 <= j {
                    k -= 28;
                }
                perm[i] = temp[k as usize];
            }
            init_perm(&mut tables.pc2_rot[j as usize], &perm);
        }

        for i in 0..8 {
            for j in 0..8 {
                let mut k = if j < 2 {
                    0
                } else {
                    i32::from(IP[usize::from(EXPAND_TR[i * 6 + j - 2]) - 1])
                };
                if k > 32 {
                    k -= 32;
                } else if k > 0 {
                    k -= 1;
                }
                if k > 0 {
                    k = flip_bit_position(k);
                }
                perm[i * 8 + j] = k as u8;
            }
        }

        for (i, &cifp) in CIFP.iter().enumerate() {
            let k = flip_bit_position(i32::from(IP[usize::from(cifp) - 1]));
            perm[(k - 1) as usize] = (i + 1) as u8;
        }
        init_perm(&mut tables.cf6464, &perm);

        for i in 0..48 {
            perm[i] = P32_TR[usize::from(EXPAND_TR[i]) - 1];
        }
        for t in 0..8 {
            for j in 0..64usize {
                let row = (j & 0x01) << 5
                    | (j >> 1 & 0x01) << 3
                    | (j >> 2 & 0x01) << 2
                    | (j >> 3 & 0x01) << 1
                    | (j >> 4 & 0x01)
                    | (j >> 5 & 0x01) << 4;
                let k = S[t][row];
                let k = (k >> 3 & 0x01) | (k >> 2 & 0x01) << 1 | (k >> 1 & 0x01) << 2 | (k & 0x01) << 3;
                temp[..32].fill(0);
                for i in 0..4 {
                    temp[4 * t + i] = (k >> i) & 0x01;
                }
                let mut kk: i64 = 0;
                for i in (0..24).rev() {
                    kk = kk << 1
                        | i64::from(temp[usize::from(perm[i]) - 1]) << 32
                        | i64::from(temp[usize::from(perm[i + 24]) - 1]);
                }
                tables.spe[t][j] = to_six_bit(kk);
            }
        }
        tables
    }
}

fn tables() -> &'static DesTables {
    static TABLES: OnceLock<DesTables> = OnceLock::new();
    TABLES.get_or_init(DesTables::build)
}

fn to_six_bit(num: i64) -> i64 {
    (num << 26 & 0xfc00_0000_fc00_0000u64 as i64)
        | (num << 12 & 0x00fc_0000_00fc_0000)
        | (num >> 2 & 0x0000_fc00_0000_fc00)
        | (num >> 16 & 0x0000_00fc_0000_00fc)
}

fn perm6464(mut c: i64, p: &PermTable) -> i64 {
    let mut out = 0i64;
    for i in (0..8).rev() {
        let t = (c & 0xff) as usize;
        c >>= 8;
        out |= p[i << 1][t & 0x0f];
        out |= p[(i << 1) + 1][t >> 4];
    }
    out
}

fn des_set_key(keyword: i64, tables: &DesTables) -> [i64; 16] {
    let mut k = perm6464(keyword, &tables.pc1_rot);
    let mut ks = [0i64; 16];
    ks[0] = k & KEY_SCHEDULE_MASK;
    for i in 1..16 {
        k = perm6464(k, &tables.pc2_rot[usize::from(ROTATES[i]) - 1]);
        ks[i] = k & KEY_SCHEDULE_MASK;
    }
    ks
}

fn op_salt(r: i64) -> i64 {
    let k = ((r >> 32) ^ r) & FB_SALT;
    k | k << 32
}

fn op_spe(b: i64, spe: &[[i64; 64]; 8]) -> i64 {
    (0..8).fold(0, |acc, t| acc ^ spe[t][(b >> (58 - 8 * t) & 0x3f) as usize])
}

fn des_cipher(ks: &[i64; 16], tables: &DesTables) -> i64 {
    let mut l = 0i64;
    let mut r = 0i64;
    for _ in 0..ITERATIONS {
        for round in 0..8 {
            l ^= op_spe(op_salt(r) ^ r ^ ks[round << 1], &tables.spe);
            r ^= op_spe(op_salt(l) ^ l ^ ks[(round << 1) + 1], &tables.spe);
        }
        std::mem::swap(&mut l, &mut r);
    }
    l = (l >> 35 & 0x0f0f_0f0f | l << 1 & 0xf0f0_f0f0) << 32
        | r >> 35 & 0x0f0f_0f0f
        | r << 1 & 0xf0f0_f0f0;
    perm6464(l, &tables.cf6464)
}

/// Legacy password hash: 11 characters, or `*` without a password
pub fn legacy_hash(password: Option<&str>) -> Vec<u8> {
    let Some(password) = password else {
        return vec![b'*'];
    };

    let mut chars = password.encode_utf16();
    let keyword = (0..8).fold(0i64, |acc, _| {
        acc << 8 | chars.next().map_or(0, |c| 2 * i64::from(c))
    });

    let tables = tables();
    let mut block = des_cipher(&des_set_key(keyword, tables), tables);

    let mut out = vec![0u8; 11];
    out[10] = ITOA64[(((block as i32) << 2) & 0x3f) as usize];
    block >>= 4;
    for slot in out[..10].iter_mut().rev() {
        *slot = ITOA64[((block as i32) & 0x3f) as usize];
        block >>= 6;
    }
    out
}

/// Client side of `Legacy_Auth`
///
/// Sends the hash as the only client data; never needs server data and
/// never yields a session key.
#[derive(Debug, Default)]
pub struct LegacyAuthPlugin {
    client_data: Option<Vec<u8>>,
    has_server_data: bool,
}

impl AuthenticationPlugin for LegacyAuthPlugin {
    fn name(&self) -> &str {
        LEGACY_AUTH_NAME
    }

    fn authenticate(&mut self, credentials: &AuthCredentials) -> Result<AuthStatus> {
        if self.client_data.is_some() {
            return Ok(AuthStatus::NotApplicable);
        }
        if credentials.login().is_none() || credentials.password().is_none() {
            return Ok(AuthStatus::NotApplicable);
        }
        self.client_data = Some(legacy_hash(credentials.password()));
        Ok(AuthStatus::Success)
    }

    fn client_data(&self) -> Option<&[u8]> {
        self.client_data.as_deref()
    }

    fn set_server_data(&mut self, data: Vec<u8>) {
        self.has_server_data = !data.is_empty();
    }

    fn has_server_data(&self) -> bool {
        self.has_server_data
    }

    fn generates_session_key(&self) -> bool {
        false
    }

    fn session_key(&self) -> Result<Vec<u8>> {
        Err(Error::Authentication(format!(
            "{} cannot generate a session key",
            LEGACY_AUTH_NAME
        )))
    }
}

/// Provider of [`LegacyAuthPlugin`]
#[derive(Debug, Default, Clone, Copy)]
pub struct LegacyAuthPluginSpi;

impl AuthenticationPluginSpi for LegacyAuthPluginSpi {
    fn plugin_name(&self) -> &str {
        LEGACY_AUTH_NAME
    }

    fn create_plugin(&self) -> Box<dyn AuthenticationPlugin> {
        Box::<LegacyAuthPlugin>::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn is_crypt_alphabet(b: u8) -> bool {
        b == b'.' || b == b'/' || b.is_ascii_alphanumeric()
    }

    #[test]
    fn test_null_password() {
        assert_eq!(legacy_hash(None), b"*");
    }

    #[test]
    fn test_hash_shape_and_determinism() {
        for password in ["", "a", "masterkey", "SYSDBA", "lóng pässwörd"] {
            let first = legacy_hash(Some(password));
            assert_eq!(first.len(), 11, "{}", password);
            assert!(first.iter().all(|&b| is_crypt_alphabet(b)), "{}", password);
            assert_eq!(first, legacy_hash(Some(password)));
        }
    }

    #[test]
    fn test_known_hashes() {
        assert_eq!(legacy_hash(Some("masterkey")), b"QP3LMZ/MJh.");
        assert_eq!(legacy_hash(Some("SYSDBA")), b"1S6DteszQU.");
        assert_eq!(legacy_hash(Some("")), b"retK2Kk/GLk");
    }

    #[test]
    fn test_only_first_eight_characters_count() {
        assert_eq!(legacy_hash(Some("masterke")), legacy_hash(Some("masterkey")));
        assert_eq!(legacy_hash(Some("masterkey")), legacy_hash(Some("masterkex")));
        assert_ne!(legacy_hash(Some("masterkey")), legacy_hash(Some("masterkY")));
        assert_ne!(legacy_hash(Some("masterkey")), legacy_hash(Some("Masterkey")));
    }

    #[test]
    fn test_plugin_without_password_is_not_applicable() {
        let mut plugin = LegacyAuthPlugin::default();
        let credentials = AuthCredentials::new(Some("SYSDBA".into()), None);
        assert_eq!(plugin.authenticate(&credentials).unwrap(), AuthStatus::NotApplicable);
        assert!(plugin.client_data().is_none());
    }

    #[test]
    fn test_plugin_succeeds_in_one_step() {
        let mut plugin = LegacyAuthPluginSpi.create_plugin();
        let credentials = AuthCredentials::new(Some("SYSDBA".into()), Some("masterkey".into()));
        assert_eq!(plugin.authenticate(&credentials).unwrap(), AuthStatus::Success);
        assert_eq!(plugin.client_data(), Some(&legacy_hash(Some("masterkey"))[..]));
        assert!(!plugin.generates_session_key());
        assert!(plugin.session_key().is_err());
    }
}
