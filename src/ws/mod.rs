//! Front Controller's WebSocket half: the read/write loop a socket runs
//! once `/ws/{roomId}` has upgraded it. See `connection::handle_socket`.

pub mod connection;
