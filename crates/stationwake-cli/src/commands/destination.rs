use clap::Subcommand;
use stationwake_core::storage::SqliteDestinationStore;
use stationwake_core::{distance_metres, Coordinate, Destination, DestinationStore};

#[derive(Subcommand)]
pub enum DestinationAction {
    /// Select the station to be alerted for
    Set {
        /// Display name of the station
        name: String,
        /// Latitude in decimal degrees
        latitude: f64,
        /// Longitude in decimal degrees
        longitude: f64,
    },
    /// Print the stored destination as JSON
    Show,
    /// Distance in metres from the stored destination to a point
    Distance {
        /// Latitude in decimal degrees
        latitude: f64,
        /// Longitude in decimal degrees
        longitude: f64,
    },
}

pub fn run(action: DestinationAction) -> Result<(), Box<dyn std::error::Error>> {
    let store = SqliteDestinationStore::open()?;
    match action {
        DestinationAction::Set {
            name,
            latitude,
            longitude,
        } => {
            let destination = Destination::new(name, latitude, longitude);
            store.set(&destination)?;
            println!("{}", serde_json::to_string_pretty(&destination)?);
        }
        DestinationAction::Show => match store.get()? {
            Some(destination) => println!("{}", serde_json::to_string_pretty(&destination)?),
            None => {
                eprintln!("no destination set");
                std::process::exit(1);
            }
        },
        DestinationAction::Distance {
            latitude,
            longitude,
        } => {
            let destination = store.get()?.ok_or("no destination set")?;
            let here = Coordinate::new(latitude, longitude);
            println!("{:.1}", distance_metres(here, destination.coordinate()));
        }
    }
    Ok(())
}
