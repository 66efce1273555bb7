pub mod history_server;
