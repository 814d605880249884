mod test_emitter;
mod test_lifecycle;
