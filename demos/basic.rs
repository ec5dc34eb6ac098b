use gamequery::Request;

fn main() {
    simple_logger::init().expect("initialize logger");

    let request = Request::new("127.0.0.1").game("source").port(27015);
    let response = gamequery::query(&request).expect("query server status");

    println!("Server Name:     {}", response.name);
    println!("Players Online:  {}", response.players.current);
    println!("Players Max:     {}", response.players.max);

    println!();

    for player in &response.players.names {
        println!("Player: {player}");
    }
}
