#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &str| {
    // Parse and validation errors are fine; panics are not. Anything the
    // config crate accepts must also be accepted by the controller.
    if let Ok(cfg) = toml::from_str::<afc_config::Config>(data) {
        if cfg.validate().is_ok() {
            let core: afc_core::AfcCfg = (&cfg).into();
            if let Err(e) = afc_core::builder::validate(&core) {
                panic!("config validated but the controller rejects it: {e}");
            }
        }
    }
});
