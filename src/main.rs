fn main() {
    if let Err(err) = countcups_lib::run() {
        eprintln!("countcups: {err:#}");
        std::process::exit(1);
    }
}
