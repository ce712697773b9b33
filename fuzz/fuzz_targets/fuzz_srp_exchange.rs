#![no_main]

use firebird_wire::auth::srp::SrpPlugin;
use firebird_wire::auth::{AuthCredentials, AuthenticationPlugin};
use libfuzzer_sys::arbitrary::{Arbitrary, Unstructured};
use libfuzzer_sys::fuzz_target;

#[derive(Debug)]
struct SrpInput {
    user: String,
    password: String,
    server_data: Vec<u8>,
    sha256: bool,
}

impl<'a> Arbitrary<'a> for SrpInput {
    fn arbitrary(u: &mut Unstructured<'a>) -> libfuzzer_sys::arbitrary::Result<Self> {
        Ok(Self {
            user: u.arbitrary()?,
            password: u.arbitrary()?,
            server_data: u.arbitrary()?,
            sha256: u.arbitrary()?,
        })
    }
}

fuzz_target!(|input: SrpInput| {
    let credentials = AuthCredentials::new(Some(input.user), Some(input.password));
    let mut plugin = if input.sha256 {
        SrpPlugin::sha256()
    } else {
        SrpPlugin::sha1()
    };
    if plugin.authenticate(&credentials).is_err() {
        return;
    }
    plugin.set_server_data(input.server_data);
    if plugin.authenticate(&credentials).is_ok() {
        let _ = plugin.session_key();
    }
});
