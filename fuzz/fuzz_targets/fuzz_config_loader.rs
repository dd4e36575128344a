#![no_main]
use libfuzzer_sys::fuzz_target;

// Arbitrary TOML must either be rejected or yield runtime settings without panicking.
fuzz_target!(|data: &str| {
    let Ok(cfg) = rover_config::load_toml(data) else {
        return;
    };
    if cfg.validate().is_ok() {
        let sup = rover_core::SupervisorCfg::from(&cfg);
        let _ = sup.distance_mask();
        for &port in &sup.distance_ports {
            let _ = sup.distance_address(port);
        }
        let nav = rover_core::NavigationCfg::from(&cfg);
        let _ = nav.frame_period();
    }
});
