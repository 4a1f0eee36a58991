mod test_join_gating;
