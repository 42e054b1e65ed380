fn main() {
    if let Err(err) = note_voyeur::entry() {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}
