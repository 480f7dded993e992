//! Arm Juggler entry point
//!
//! The browser build is driven from JavaScript through `platform::WebSandbox`.
//! Natively this runs headless training and logs progress:
//!
//! ```text
//! arm-juggler [episodes] [ppo|pg] [settings.json]
//! ```

#[cfg(not(target_arch = "wasm32"))]
fn main() {
    use arm_juggler::platform::settings_or_default;
    use arm_juggler::sim::Viewport;
    use arm_juggler::{PolicyMode, Sandbox};

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    log::info!("Arm Juggler (native) starting...");

    let args: Vec<String> = std::env::args().skip(1).collect();
    let episodes: u64 = match args.first().map(|s| s.parse()) {
        None => 200,
        Some(Ok(n)) => n,
        Some(Err(_)) => {
            log::error!("Episode count must be a number, got {:?}", args[0]);
            std::process::exit(2);
        }
    };

    let settings_json = args.get(2).and_then(|path| match std::fs::read_to_string(path) {
        Ok(json) => Some(json),
        Err(e) => {
            log::warn!("Could not read {}: {}", path, e);
            None
        }
    });
    let mut settings = settings_or_default(settings_json.as_deref());
    if let Some(name) = args.get(1) {
        match PolicyMode::from_str(name) {
            Some(mode) => settings.mode = mode,
            None => log::warn!("Unknown policy mode {:?}, using {}", name, settings.mode.as_str()),
        }
    }

    let mut sandbox = Sandbox::new(settings, Viewport::default());
    sandbox.start_training();

    let report_every = (episodes / 20).max(1);
    while sandbox.stats().episodes < episodes {
        let Some(end) = sandbox.step() else {
            continue;
        };
        if end.episode % report_every == 0 || end.episode == episodes {
            let stats = sandbox.stats();
            log::info!(
                "Episode {}/{}: {} goals, {} misses, success(100) {:.0}%, std {:.3}, baseline {:.3}",
                end.episode,
                episodes,
                stats.goals,
                stats.misses,
                stats.success_rate * 100.0,
                stats.std,
                stats.baseline
            );
        }
    }

    sandbox.stop_training();
    match arm_juggler::platform::stats_json(&sandbox) {
        Ok(json) => println!("{}", json),
        Err(e) => log::error!("Could not serialize stats: {}", e),
    }
}

#[cfg(target_arch = "wasm32")]
fn main() {
    // WASM entry point is platform::web::start, this is just to satisfy the compiler
}
