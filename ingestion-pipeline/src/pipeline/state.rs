use state_machines::state_machine;

state_machine! {
    name: IngestionMachine,
    initial: Uploaded,
    states: [Uploaded, Extracting, Chunking, Embedding, Indexed, Failed],
    events {
        start_extraction { transition: { from: Uploaded, to: Extracting } }
        start_chunking { transition: { from: Extracting, to: Chunking } }
        start_embedding { transition: { from: Chunking, to: Embedding } }
        finish { transition: { from: Embedding, to: Indexed } }
        abort {
            transition: { from: Uploaded, to: Failed }
            transition: { from: Extracting, to: Failed }
            transition: { from: Chunking, to: Failed }
            transition: { from: Embedding, to: Failed }
        }
    }
}

pub fn uploaded() -> IngestionMachine<(), Uploaded> {
    IngestionMachine::new(())
}
