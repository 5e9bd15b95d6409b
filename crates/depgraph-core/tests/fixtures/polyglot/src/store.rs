pub fn save() {
    println!("saved");
}
