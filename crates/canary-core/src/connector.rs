use crate::{connection::Connection, types::TestUnit};

pub trait AbstractConnector: Send + Sync {
	type Connection: Connection;

	/// Open a connection to the unit's target through the transport under test
	fn connect(&self, unit: &TestUnit<'_>) -> impl Future<Output = eyre::Result<Self::Connection>> + Send;
}
