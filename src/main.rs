use std::io;

use anyhow::{anyhow, Context};
use clap::{clap_app, crate_version, ArgMatches};

use buzzer_control::config::{self, Config, CLOCK_RANGE, SHM_SIZE};
use buzzer_control::hal::SimPwm;
use buzzer_control::os::SharedRegion;
use buzzer_control::{logger, Application};

fn main() -> anyhow::Result<()> {
    let app = clap_app!(buzzer_control =>
        (version: crate_version!())
        (author: "REXIN (Fayssal Chokri)")
        (about: "Plays a buzzer at the frequency published in shared memory.")
        (@arg shm: -n --shm +takes_value "Shared memory region holding the frequency (default /GUI)")
        (@arg pin: -p --pin +takes_value "BCM GPIO of the buzzer: 12, 13, 18 or 19 (default 18)")
        (@arg base: -b --base +takes_value "Peripheral base address in hex (default: read from the device tree)")
        (@arg simulate: -s --simulate "Drive a simulated PWM peripheral instead of the hardware")
        (@arg verbose: -v ... "Log more; repeat to log register writes")
    );
    let config = config_from(&app.get_matches())?;

    logger::init(config.verbosity).context("logger already installed")?;

    let region = SharedRegion::open(&config.shm_name, SHM_SIZE)
        .context("is the frequency producer running?")?;
    let app = Application::new(&region, SHM_SIZE);

    if config.simulate {
        app.run(SimPwm::new(CLOCK_RANGE), |_| wait_for_quit())?;
    } else {
        let pwm = hardware(&config)?;
        app.run(pwm, |_| wait_for_quit())?;
    }

    log::info!("{}", app.shared().diagnostics.summary());
    region.close()?;
    println!("Program is Terminated");
    Ok(())
}

fn config_from(matches: &ArgMatches<'_>) -> anyhow::Result<Config> {
    let mut config = Config::default();
    if let Some(name) = matches.value_of("shm") {
        config.shm_name = name.to_string();
    }
    if let Some(pin) = matches.value_of("pin") {
        config.gpio = pin
            .parse()
            .with_context(|| format!("invalid GPIO number {:?}", pin))?;
    }
    if let Some(base) = matches.value_of("base") {
        let parsed = config::parse_base(base)
            .ok_or_else(|| anyhow!("invalid peripheral base {:?}", base))?;
        config.peripheral_base = Some(parsed);
    }
    config.simulate = matches.is_present("simulate");
    config.verbosity = matches.occurrences_of("verbose");
    Ok(config)
}

#[cfg(feature = "bcm2835")]
fn hardware(config: &Config) -> anyhow::Result<buzzer_control::hal::Bcm2835> {
    use buzzer_control::hal::{bcm2835, Bcm2835, PwmMode};

    let base = match config.peripheral_base {
        Some(base) => base,
        None => bcm2835::detect_base().context("pass --base or --simulate")?,
    };
    Bcm2835::new(base, config.gpio, PwmMode::MarkSpace, CLOCK_RANGE)
        .context("cannot set up the PWM peripheral (root is needed for /dev/mem)")
}

#[cfg(not(feature = "bcm2835"))]
fn hardware(_config: &Config) -> anyhow::Result<SimPwm> {
    Err(anyhow!("built without the bcm2835 feature; use --simulate"))
}

/// Blocks until the user enters a line or closes stdin
fn wait_for_quit() {
    println!("Please, enter any character to quit the program.....");
    let mut line = String::new();
    if let Err(e) = io::stdin().read_line(&mut line) {
        log::warn!("stdin: {}", e);
    }
}
