fn main() {
    std::process::exit(funcy_drv::run());
}
