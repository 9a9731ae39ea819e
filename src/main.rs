fn main() {
    if let Err(err) = campaign_kpi::run() {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}
