mod builder_steps;
mod coin_selection_proptest;
mod keykeeper;
