use std::sync::Arc;

use rocket::{
    fairing::{Fairing, Info, Kind},
    Build, Rocket,
};
use serde::Deserialize;

use crate::ledger::Ledger;
use crate::model::{
    mongodb::{MemoryStore, MongoStore, StateStore},
    Identity, SystemClock, TokenKey,
};
use crate::source::{GatewaySource, IdentitySource, NoSource};

/// Application configuration, derived from `Rocket.toml` and `ROCKET_*`
/// environment variables. This struct becomes managed state and can be
/// inspected by any endpoint.
#[derive(Deserialize)]
pub struct Config {
    // non-secrets
    root_authority: String,
    identity_gateway: Option<String>,
    // secrets
    token_secret: String,
}

impl Config {
    /// The identity with irrevocable control over the election.
    pub fn root_authority(&self) -> Identity {
        Identity::new(self.root_authority.trim())
    }

    /// Base URL of the gateway serving candidate and voter lists, if any.
    pub fn identity_gateway(&self) -> Option<&str> {
        self.identity_gateway.as_deref()
    }

    /// Key used to digest voters' identity tokens.
    pub fn token_key(&self) -> TokenKey {
        TokenKey::new(&self.token_secret)
    }
}

/// A fairing that loads the application config and puts it in managed state.
pub struct ConfigFairing;

#[rocket::async_trait]
impl Fairing for ConfigFairing {
    fn info(&self) -> Info {
        Info {
            name: "Config",
            kind: Kind::Ignite,
        }
    }

    async fn on_ignite(&self, mut rocket: Rocket<Build>) -> rocket::fairing::Result {
        // Load the config.
        let config = match rocket.figment().extract::<Config>() {
            Ok(config) => config,
            Err(e) => {
                error!("Failed to load application config");
                rocket::config::pretty_print_error(e);
                return Err(rocket);
            }
        };
        if config.root_authority.trim().is_empty() {
            error!("`root_authority` must not be empty");
            return Err(rocket);
        }

        // Manage the state.
        rocket = rocket.manage(config);
        Ok(rocket)
    }
}

/// Configuration for the database.
#[derive(Deserialize)]
struct DbConfig {
    // non-secrets
    #[serde(default = "default_db_name")]
    db_name: String,
    // secrets
    db_uri: Option<String>,
}

fn default_db_name() -> String {
    "election".to_string()
}

/// A fairing that connects the store, resumes the stored election and places
/// the [`Ledger`] into managed state. Must be attached after [`ConfigFairing`].
pub struct LedgerFairing;

#[rocket::async_trait]
impl Fairing for LedgerFairing {
    fn info(&self) -> Info {
        Info {
            name: "Ledger",
            kind: Kind::Ignite,
        }
    }

    async fn on_ignite(&self, mut rocket: Rocket<Build>) -> rocket::fairing::Result {
        let (root, key) = match rocket.state::<Config>() {
            Some(config) => (config.root_authority(), config.token_key()),
            None => {
                error!("Application config is not loaded");
                return Err(rocket);
            }
        };
        let db_config = match rocket.figment().extract::<DbConfig>() {
            Ok(config) => config,
            Err(e) => {
                error!("Failed to load database config");
                rocket::config::pretty_print_error(e);
                return Err(rocket);
            }
        };

        let store: Arc<dyn StateStore> = match db_config.db_uri {
            Some(uri) => {
                info!("Loaded database config, connecting...");
                match MongoStore::connect(&uri, &db_config.db_name).await {
                    Ok(store) => {
                        info!("...database connection online!");
                        Arc::new(store)
                    }
                    Err(e) => {
                        error!("Failed to connect to database: {e}");
                        return Err(rocket);
                    }
                }
            }
            None => {
                warn!("No `db_uri` configured, election state will not survive a restart");
                Arc::new(MemoryStore::default())
            }
        };

        let ledger = match Ledger::open(root, key, Arc::new(SystemClock), store).await {
            Ok(ledger) => ledger,
            Err(e) => {
                error!("Failed to open the election: {e}");
                return Err(rocket);
            }
        };

        // Manage the state.
        rocket = rocket.manage(ledger);
        Ok(rocket)
    }
}

/// A fairing that places a `Box<dyn IdentitySource>` into managed state: a
/// gateway client if one is configured, otherwise a source that refuses
/// every fetch. Must be attached after [`ConfigFairing`].
pub struct IdentitySourceFairing;

#[rocket::async_trait]
impl Fairing for IdentitySourceFairing {
    fn info(&self) -> Info {
        Info {
            name: "Identity source",
            kind: Kind::Ignite,
        }
    }

    async fn on_ignite(&self, rocket: Rocket<Build>) -> rocket::fairing::Result {
        let gateway = rocket
            .state::<Config>()
            .and_then(|config| config.identity_gateway().map(str::to_string));
        let source: Box<dyn IdentitySource> = match gateway {
            Some(url) => {
                info!("Fetching candidate and voter lists from {url}");
                Box::new(GatewaySource::new(url))
            }
            None => {
                info!("No `identity_gateway` configured, list imports are disabled");
                Box::new(NoSource)
            }
        };
        Ok(rocket.manage(source))
    }
}

#[cfg(test)]
mod tests {
    use rocket::{error::ErrorKind, figment::Figment};

    use super::*;

    #[test]
    fn config_from_figment() {
        let figment = Figment::new()
            .merge(("root_authority", " 0xroot "))
            .merge(("token_secret", "secret"));
        let config: Config = figment.extract().unwrap();
        assert_eq!(config.root_authority(), Identity::new("0xroot"));
        assert_eq!(config.identity_gateway(), None);
        assert_eq!(
            config.token_key().digest("tok"),
            TokenKey::new("secret").digest("tok")
        );

        let db: DbConfig = Figment::new().extract().unwrap();
        assert_eq!(db.db_name, "election");
        assert!(db.db_uri.is_none());
    }

    #[rocket::async_test]
    async fn ledger_starts_in_memory_without_db_uri() {
        let figment = Figment::from(rocket::Config::default())
            .merge(("root_authority", "0xroot"))
            .merge(("token_secret", "secret"));
        let rocket = rocket::custom(figment)
            .attach(ConfigFairing)
            .attach(LedgerFairing)
            .attach(IdentitySourceFairing)
            .ignite()
            .await
            .unwrap();

        let ledger = rocket.state::<Ledger>().unwrap();
        assert!(ledger.snapshot().access().is_root(&Identity::new("0xroot")));
        assert!(rocket.state::<Box<dyn IdentitySource>>().is_some());
    }

    #[rocket::async_test]
    async fn missing_config_refuses_to_start() {
        let figments = [
            Figment::from(rocket::Config::default()),
            Figment::from(rocket::Config::default())
                .merge(("root_authority", "  "))
                .merge(("token_secret", "secret")),
        ];
        for figment in figments {
            // Inspecting the error marks it handled; an unhandled one panics on drop.
            let err = rocket::custom(figment)
                .attach(ConfigFairing)
                .attach(LedgerFairing)
                .ignite()
                .await
                .unwrap_err();
            match err.kind() {
                ErrorKind::FailedFairings(failures) => {
                    assert_eq!(failures[0].name, "Config");
                }
                kind => panic!("unexpected launch error: {kind:?}"),
            }
        }
    }
}
