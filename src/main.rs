//! # Timed-Multitasking Helicopter Demo
//!
//! Runs one role of the demo per process, or every role in this process.
//!
//! ## Roles
//! - **Controller:** GPS/INS listeners → filter → state feedback → actuator output,
//!   deadline scheduled.
//! - **Plant:** reads shm `'d'`, steps the vehicle model, writes shm `'c'`, feeds the display.
//! - **GPS / INS:** sample shm `'c'` with noise and send to the controller.
//! - **Actuator sink:** UDP commands → shm `'d'`.
//! - **Display:** logs the published pose.
//!
//! ## Outputs
//! - `data/scheduler_summary.csv`, `data/actors.csv`: controller counters per run.
//! - `data/logs/events.csv`: per-trigger lifecycle trace of the controller.

use std::{
    fs::create_dir_all,
    io::{Write, stdin, stdout},
    path::Path,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    thread::{self, JoinHandle},
    time::{Duration, Instant},
};

use log::{error, info};

use tm_runtime::{
    config::RuntimeConfig,
    error::Result,
    processes::{
        actuator::run_actuator_sink,
        controller::run_controller,
        display::run_display,
        plant::{KinematicPlant, run_plant},
        sensors::{run_gps_sensor, run_ins_sensor},
    },
    utils::{events::EventRecorder, export::run_exports},
};

const DEFAULT_RUN_DURATION_SECS: u64 = 30;
const DATA_DIR: &str = "data";
const EVENTS_CSV: &str = "data/logs/events.csv";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Role {
    Controller,
    Plant,
    Gps,
    Ins,
    Actuator,
    Display,
}

impl Role {
    /// Start order for the all-in-one mode: sinks first, sources last.
    const ALL: [Role; 6] = [
        Role::Display,
        Role::Actuator,
        Role::Plant,
        Role::Controller,
        Role::Ins,
        Role::Gps,
    ];

    fn name(&self) -> &'static str {
        match self {
            Role::Controller => "controller",
            Role::Plant => "plant",
            Role::Gps => "gps",
            Role::Ins => "ins",
            Role::Actuator => "actuator",
            Role::Display => "display",
        }
    }
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    info!("=== TM RUNTIME START ===");

    loop {
        let roles: Vec<Role> = match prompt_menu().as_str() {
            "1" => vec![Role::Controller],
            "2" => vec![Role::Plant],
            "3" => vec![Role::Gps],
            "4" => vec![Role::Ins],
            "5" => vec![Role::Actuator],
            "6" => vec![Role::Display],
            "7" | "" => Role::ALL.to_vec(),
            "8" => {
                println!("Exiting. Goodbye!");
                info!("=== TM RUNTIME FINISHED ===");
                return;
            }
            other => {
                println!("Unrecognized option '{}', please try again.", other);
                continue;
            }
        };

        let secs = prompt_duration();
        run_roles(&roles, &RuntimeConfig::default(), Duration::from_secs(secs));
        println!("\n Run completed. Returning to menu...\n");
        thread::sleep(Duration::from_secs(1));
    }
}

fn prompt_menu() -> String {
    println!("\n┌─────────────────────────────────────────────┐");
    println!("│     SELECT ROLE                             │");
    println!("├─────────────────────────────────────────────┤");
    println!("│  1) Controller                              │");
    println!("│  2) Plant                                   │");
    println!("│  3) GPS sensor                              │");
    println!("│  4) INS sensor                              │");
    println!("│  5) Actuator sink                           │");
    println!("│  6) Display                                 │");
    println!("│  7) All roles in this process               │");
    println!("│  8) Exit                                    │");
    println!("└─────────────────────────────────────────────┘");
    print!("Select [1-8] (default: 7): ");
    let _ = stdout().flush();

    let mut input = String::new();
    let _ = stdin().read_line(&mut input);
    input.trim().to_string()
}

fn prompt_duration() -> u64 {
    print!("Run for how many seconds? [default: {}]: ", DEFAULT_RUN_DURATION_SECS);
    let _ = stdout().flush();
    let mut input = String::new();
    let _ = stdin().read_line(&mut input);
    input.trim().parse::<u64>().unwrap_or(DEFAULT_RUN_DURATION_SECS)
}

fn run_roles(roles: &[Role], cfg: &RuntimeConfig, duration: Duration) {
    let running = Arc::new(AtomicBool::new(true));

    let recorder = if roles.contains(&Role::Controller) {
        start_event_trace()
    } else {
        None
    };

    let mut handles = Vec::new();
    for &role in roles {
        match spawn_role(role, cfg.clone(), running.clone(), recorder.clone()) {
            Ok(h) => handles.push((role, h)),
            Err(e) => error!("[Main] could not start {}: {}", role.name(), e),
        }
        // let servers bind before their senders start
        thread::sleep(Duration::from_millis(50));
    }

    info!("[Main] Running {} role(s) for {:?}...", handles.len(), duration);
    let deadline = Instant::now() + duration;
    while running.load(Ordering::Relaxed)
        && Instant::now() < deadline
        && handles.iter().any(|(_, h)| !h.is_finished())
    {
        thread::sleep(Duration::from_millis(100));
    }

    info!("[Main] Time's up! Setting running = false");
    running.store(false, Ordering::Relaxed);

    for (role, h) in handles {
        match h.join() {
            Ok(Ok(count)) => info!("[Main] {} finished ({} cycles)", role.name(), count),
            Ok(Err(e)) => error!("[Main] {} failed: {}", role.name(), e),
            Err(_) => error!("[Main] {} thread panicked", role.name()),
        }
    }

    if let Some(rec) = recorder {
        rec.stop_exporter();
        info!("[Main] Events exported to: {}", EVENTS_CSV);
    }
}

fn spawn_role(
    role: Role,
    cfg: RuntimeConfig,
    running: Arc<AtomicBool>,
    recorder: Option<EventRecorder>,
) -> std::io::Result<JoinHandle<Result<u64>>> {
    thread::Builder::new()
        .name(format!("tm-{}", role.name()))
        .spawn(move || -> Result<u64> {
            match role {
                Role::Controller => {
                    let metrics = run_controller(&cfg, running, recorder)?;
                    run_exports(&metrics, Path::new(DATA_DIR));
                    Ok(metrics.snapshot().executed)
                }
                Role::Plant => run_plant(&cfg, running, &mut KinematicPlant::default()),
                Role::Gps => run_gps_sensor(&cfg, running),
                Role::Ins => run_ins_sensor(&cfg, running),
                Role::Actuator => run_actuator_sink(&cfg, running),
                Role::Display => run_display(&cfg, running),
            }
        })
}

fn start_event_trace() -> Option<EventRecorder> {
    let log_dir = Path::new(EVENTS_CSV).parent().unwrap_or(Path::new(DATA_DIR));
    if let Err(e) = create_dir_all(log_dir) {
        error!("Failed to create log directory {:?}: {}", log_dir, e);
        return None;
    }
    let recorder = EventRecorder::new();
    match recorder.start_exporter(EVENTS_CSV.into()) {
        Ok(()) => Some(recorder),
        Err(e) => {
            error!("[Main] event trace disabled: {}", e);
            None
        }
    }
}
