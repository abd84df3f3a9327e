fn main() {
    let schema = oasfix_config::schema();
    let json = serde_json::to_string_pretty(&schema).expect("schema serialization");
    println!("{json}");
}
