fn main() {
    if let Err(err) = erp_sheet_tools::run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}
