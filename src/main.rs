fn main() {
    if let Err(err) = agro_report::run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}
