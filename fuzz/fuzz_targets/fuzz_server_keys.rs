#![no_main]

use firebird_wire::crypt::KnownServerKey;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(keys) = KnownServerKey::parse_keys(data) {
        for key in &keys {
            for plugin in key.plugin_specific_data() {
                let _ = plugin.identifier.to_string();
            }
        }
    }
});
