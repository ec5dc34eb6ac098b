pub mod minecraft_tcp;
pub mod minecraft_udp;
pub mod source;
