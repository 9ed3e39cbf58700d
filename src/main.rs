fn main() { std::process::exit(langsync::cli::main()) }
