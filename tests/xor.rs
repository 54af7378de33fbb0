//! End-to-end training on XOR

use synapses::{
    create_network, root_mean_square_error, score, train, ActivationFunction, Network,
    TrainingConfig, TrainingEngine, TrainingExample, TrainingState,
};

fn xor() -> Vec<TrainingExample> {
    vec![
        TrainingExample::new(vec![0.0, 0.0], vec![0.0]),
        TrainingExample::new(vec![0.0, 1.0], vec![1.0]),
        TrainingExample::new(vec![1.0, 0.0], vec![1.0]),
        TrainingExample::new(vec![1.0, 1.0], vec![0.0]),
    ]
}

fn xor_network() -> Network {
    create_network(2, &[(2, "sigmoid"), (1, "sigmoid")], 42).unwrap()
}

#[test]
fn test_xor_plain_gradient_descent() {
    let config = TrainingConfig {
        epochs: 5000,
        learning_rate: 2.0,
        batch_size: 4,
        shuffle: false,
        ..TrainingConfig::default()
    };
    let trained = train(xor_network(), &xor(), &config).unwrap();

    assert_eq!(trained.report.outcome, TrainingState::MaxEpochsReached);
    assert!(trained.report.final_loss.unwrap() < 0.05);
    assert!(root_mean_square_error(&trained.network, &xor()).unwrap() < 0.25);
    assert_eq!(score(&trained.network, &xor()).unwrap(), 1.0);

    for example in xor() {
        let out = trained.network.predict(&example.input).unwrap()[0];
        assert!((out - example.target[0]).abs() < 0.3, "{:?} -> {out}", example.input);
    }
}

#[test]
fn test_xor_with_momentum() {
    let config = TrainingConfig {
        epochs: 2000,
        learning_rate: 0.5,
        momentum: Some(0.9),
        ..TrainingConfig::xor()
    };
    let trained = train(xor_network(), &xor(), &config).unwrap();
    assert!(trained.report.final_loss.unwrap() < 0.05);
    assert_eq!(score(&trained.network, &xor()).unwrap(), 1.0);
}

#[test]
fn test_loss_history_trends_down() {
    let trained = train(xor_network(), &xor(), &TrainingConfig::xor()).unwrap();
    let history = &trained.report.loss_history;
    assert_eq!(history.len(), 5000);
    assert!(history.last().unwrap() < history.first().unwrap());
    assert_eq!(trained.report.final_loss, history.last().copied());
}

#[test]
fn test_training_is_reproducible() {
    let config = TrainingConfig {
        epochs: 200,
        learning_rate: 0.5,
        batch_size: 2,
        shuffle: true,
        seed: 9,
        ..TrainingConfig::default()
    };
    let a = train(xor_network(), &xor(), &config).unwrap();
    let b = train(xor_network(), &xor(), &config).unwrap();
    assert_eq!(a.network, b.network);
    assert_eq!(a.report.loss_history, b.report.loss_history);
}

#[test]
fn test_tanh_hidden_layer_learns_xor() {
    let mut net = Network::new(
        2,
        &[
            (4, ActivationFunction::Tanh),
            (1, ActivationFunction::Sigmoid),
        ],
        42,
    )
    .unwrap();
    let config = TrainingConfig {
        loss_threshold: Some(0.01),
        epochs: 20_000,
        learning_rate: 0.5,
        momentum: Some(0.9),
        ..TrainingConfig::xor()
    };
    let mut engine = TrainingEngine::new(config).unwrap();
    let report = engine.run(&mut net, &xor()).unwrap();
    assert_eq!(report.outcome, TrainingState::Converged);
    assert!(report.final_loss.unwrap() < 0.01);
}
