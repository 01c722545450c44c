fn main() {
    relief_raster::cli::run();
}
