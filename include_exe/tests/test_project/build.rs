fn main() {
    include_exe::Config::new("blobs/hello.sh")
        .name("hello")
        .version("1.0.0")
        .build()
        .expect("Failed to embed blobs/hello.sh");
}
