pub mod petstore {
    include!(concat!(env!("OUT_DIR"), "/petstore.rs"));
}
