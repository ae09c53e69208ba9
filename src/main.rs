use clap::Parser;
use dialoguer::Select;
use mtcsyncrs::{
    cli::{validate_device, Args, Command},
    config::Settings,
    handle_device_list, logging,
    midi::MidirEngine,
    mtc::{GeneratorConfig, MtcGenerator, MtcReceiver, ReceiverConfig},
    timecode::FrameRate,
    transport::{output_handler, run_midi_input},
    ui,
};
use std::io::IsTerminal;
use std::process;

fn main() {
    let args = Args::parse();
    initialize_logging(args.verbose);
    let devices = handle_device_list();

    if args.device_list {
        list_available_devices(&devices);
        return;
    }

    let Some(command) = args.command.clone() else {
        eprintln!("Nothing to do: use `generate`, `receive` or `--device-list` (see --help)");
        process::exit(2);
    };

    let settings = match Settings::load(args.config.as_deref(), &command.overrides()) {
        Ok(settings) => settings,
        Err(e) => fail(&format!("Error loading settings: {}", e)),
    };

    match command {
        Command::Generate(_) => run_generator(&settings, &devices),
        Command::Receive(_) => run_receiver(&settings, &devices),
    }
}

fn initialize_logging(verbose: bool) {
    let result = if verbose {
        logging::init_stderr_logger().map_err(|e| e.to_string())
    } else {
        logging::init_logger().map_err(|e| e.to_string())
    };
    if let Err(e) = result {
        eprintln!("Logger initialization failed: {}", e);
    }
    log::info!("Application starting");
}

fn list_available_devices(devices: &[String]) {
    println!("Available MIDI devices:");
    for device in devices {
        println!("  - {}", device);
    }
}

fn choose_device(configured: Option<&str>, devices: &[String], prompt: &str) -> String {
    if let Some(device_name) = configured {
        if let Err(error_msg) = validate_device(device_name, devices) {
            fail(&error_msg);
        }
        return device_name.to_string();
    }

    if devices.is_empty() || !std::io::stdin().is_terminal() {
        fail("No MIDI device given and none can be selected interactively");
    }

    match Select::new()
        .with_prompt(prompt)
        .items(devices)
        .default(0)
        .interact()
    {
        Ok(index) => devices[index].clone(),
        Err(e) => fail(&format!("Device selection failed: {}", e)),
    }
}

fn run_generator(settings: &Settings, devices: &[String]) {
    let device_name = choose_device(settings.output_device.as_deref(), devices, "MIDI output");
    let engine = match MidirEngine::new(None, Some(&device_name)) {
        Ok(engine) => engine,
        Err(e) => fail(&format!("Error connecting to MIDI device: {}", e)),
    };
    log::info!("Successfully connected to MIDI output: {}", device_name);

    let frame_rate = settings.frame_rate.unwrap_or(FrameRate::Fps30);
    let start = match settings.start_timecode(frame_rate) {
        Ok(start) => start,
        Err(e) => fail(&format!("Invalid start position: {}", e)),
    };

    let config = GeneratorConfig {
        local_frame_rate: frame_rate,
        full_frame_behavior: settings.full_frame_behavior,
        ..GeneratorConfig::default()
    };
    let generator = match MtcGenerator::new(config, output_handler(engine)) {
        Ok(generator) => generator,
        Err(e) => fail(&format!("Error creating generator: {}", e)),
    };
    if let Err(e) = generator.start_at(start) {
        fail(&format!("Error starting generator: {}", e));
    }

    println!("Sending MTC to {}. Press Ctrl+C to exit...", device_name);
    ui::run_generator_display(&generator);
}

fn run_receiver(settings: &Settings, devices: &[String]) {
    let device_name = choose_device(settings.input_device.as_deref(), devices, "MIDI input");
    let engine = match MidirEngine::new(Some(&device_name), None) {
        Ok(engine) => engine,
        Err(e) => fail(&format!("Error connecting to MIDI device: {}", e)),
    };
    log::info!("Successfully connected to MIDI input: {}", device_name);

    let config = ReceiverConfig {
        local_frame_rate: settings.frame_rate,
        sync_policy: settings.sync_policy(),
        ..ReceiverConfig::default()
    };
    let receiver = match MtcReceiver::new(config) {
        Ok(receiver) => receiver,
        Err(e) => fail(&format!("Error creating receiver: {}", e)),
    };
    if let Err(e) = run_midi_input(engine, receiver.input()) {
        fail(&format!("Error starting MIDI input: {}", e));
    }

    println!("Receiving MTC from {}. Press Ctrl+C to exit...", device_name);
    ui::run_receiver_display(&receiver);
}

fn fail(error_msg: &str) -> ! {
    log::error!("{}", error_msg);
    eprintln!("{}", error_msg);
    process::exit(1);
}
