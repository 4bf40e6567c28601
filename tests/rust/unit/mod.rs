mod domain_model_tests;
mod navigable_tests;
mod parser_robustness_tests;
