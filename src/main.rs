use plume::Simulation;

fn main() {
    env_logger::init();

    if let Err(e) = Simulation::new().run() {
        eprintln!("plume: {}", e);
        std::process::exit(1);
    }
}
