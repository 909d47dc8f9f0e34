mod repository;

// Setup only one time throughout the test binary.
#[ctor::ctor]
fn init() {
    colog::init();
}
