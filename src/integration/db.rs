use std::env;
use std::time::Duration;

use crate::user;

use super::Result;

#[derive(Clone)]
pub struct Config {
    host: String,
    port: u16,
    db: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: String::from("127.0.0.1"),
            port: 27017,
            db: String::from("conversations"),
        }
    }
}

impl Config {
    pub fn env() -> Result<Self> {
        let host = env::var("MONGO_HOST")?;
        let port = env::var("MONGO_PORT")?.parse()?;
        let db = env::var("MONGO_DB")?;
        Ok(Self { host, port, db })
    }

    pub fn connect(&self) -> mongodb::Database {
        let options = mongodb::options::ClientOptions::builder()
            .hosts(vec![mongodb::options::ServerAddress::Tcp {
                host: self.host.clone(),
                port: Some(self.port),
            }])
            .server_selection_timeout(Some(Duration::from_secs(2)))
            .connect_timeout(Some(Duration::from_secs(5)))
            .build();

        match mongodb::Client::with_options(options).map(|client| client.database(&self.db)) {
            Ok(db) => db,
            Err(e) => panic!("Failed to connect to MongoDB: {e}"),
        }
    }
}

impl From<user::Sub> for mongodb::bson::Bson {
    fn from(val: user::Sub) -> Self {
        mongodb::bson::Bson::String(val.0)
    }
}
