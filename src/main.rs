fn main() {
    cookierelay::cli::run();
}
